//! Order workflow engine: creation, payment settlement, status updates.
//!
//! Settlement is the sensitive path. Payment truth is established first
//! via the gateway, then recorded with a single conditional write; stock
//! consumption and notification queueing run only for the call that won
//! that write, and their failures never roll the settlement back.

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::catalog::ShippingMethod;
use crate::domain::order::{Checkout, LineItem, Order, OrderStatus};
use crate::error::AppError;
use crate::events::{EventPublisher, OrderEvent};
use crate::notify::{OrderEmailData, OrderEmailItem};
use crate::outbox::NotificationRecord;
use crate::payment::{PaymentError, PaymentVerifier};
use crate::store::{CatalogStore, OrderStore, OutboxStore, SettingsStore, SettleOutcome};

const DEFAULT_ADMIN_EMAIL: &str = "admin@metahair.com";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    /// Administrative escape hatch for corrections outside the
    /// transition table.
    #[serde(default, rename = "override")]
    pub override_transition: bool,
}

pub struct OrderWorkflow<S, V> {
    store: S,
    verifier: V,
    events: EventPublisher,
    /// Env-level fallback for the admin notification address; the
    /// persisted settings record takes precedence.
    admin_email: Option<String>,
}

impl<S, V> OrderWorkflow<S, V>
where
    S: OrderStore + CatalogStore + SettingsStore + OutboxStore,
    V: PaymentVerifier,
{
    pub fn new(store: S, verifier: V, events: EventPublisher, admin_email: Option<String>) -> Self {
        Self { store, verifier, events, admin_email }
    }

    /// Create a pending order from a checkout snapshot. Stock is not
    /// consumed and nothing is charged; both wait for verified payment.
    pub async fn create_order(&self, checkout: Checkout) -> Result<Order, AppError> {
        checkout
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if checkout.items.is_empty() {
            return Err(AppError::Validation("order must contain at least one item".into()));
        }
        for item in &checkout.items {
            if item.quantity < 1 {
                return Err(AppError::Validation(format!(
                    "invalid quantity for {}",
                    item.product_name
                )));
            }
            if item.price < 0 {
                return Err(AppError::Validation(format!(
                    "invalid price for {}",
                    item.product_name
                )));
            }
        }
        if checkout.shipping_cost < 0 {
            return Err(AppError::Validation("shipping cost cannot be negative".into()));
        }
        let items_total: i64 = checkout.items.iter().map(LineItem::line_total).sum();
        if items_total != checkout.subtotal {
            return Err(AppError::Validation("subtotal does not match line items".into()));
        }
        if checkout.subtotal + checkout.shipping_cost != checkout.total {
            return Err(AppError::Validation("total does not match subtotal plus shipping".into()));
        }

        let order = self.store.insert_order(&Order::from_checkout(checkout)).await?;
        self.events
            .publish(&OrderEvent::Created {
                order_id: order.id,
                order_number: order.order_number.clone(),
                total: order.total,
            })
            .await;
        tracing::info!(order_number = %order.order_number, total = order.total, "order created");
        Ok(order)
    }

    /// Verify a gateway callback and settle the order.
    pub async fn settle_payment(&self, request: VerifyPaymentRequest) -> Result<Order, AppError> {
        let reference = request
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        let (Some(reference), Some(order_id)) = (reference, request.order_id) else {
            return Err(AppError::Validation("missing reference or orderId".into()));
        };

        let order = self.store.order(order_id).await?.ok_or(AppError::NotFound("order"))?;

        let payment = match self.verifier.verify(reference).await {
            Ok(payment) => payment,
            // Without credentials nothing was asked of the gateway; leave
            // the order untouched and fail closed.
            Err(PaymentError::MissingCredentials) => {
                return Err(PaymentError::MissingCredentials.into())
            }
            Err(err) => {
                tracing::warn!(%order_id, error = %err, "gateway verification errored");
                self.fail_settlement(order_id).await?;
                return Err(AppError::VerificationFailed(err.to_string()));
            }
        };

        if !payment.success {
            tracing::warn!(%order_id, reference, "gateway did not confirm the payment");
            self.fail_settlement(order_id).await?;
            return Err(AppError::VerificationFailed(
                "payment was not confirmed by the gateway".into(),
            ));
        }
        if payment.amount != order.total_kobo() {
            tracing::warn!(
                %order_id,
                expected = order.total_kobo(),
                reported = payment.amount,
                "gateway amount does not match the order"
            );
            self.fail_settlement(order_id).await?;
            return Err(AppError::VerificationFailed(
                "gateway amount does not match the order total".into(),
            ));
        }

        match self.store.settle_payment(order_id, reference).await? {
            SettleOutcome::Settled(order) => {
                self.consume_stock(&order).await;
                self.queue_notifications(&order, &request).await;
                self.events
                    .publish(&OrderEvent::Settled {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                        payment_reference: reference.to_string(),
                    })
                    .await;
                tracing::info!(order_number = %order.order_number, reference, "payment settled");
                Ok(order)
            }
            SettleOutcome::AlreadySettled(order) => {
                tracing::info!(order_number = %order.order_number, "settlement replay, order already completed");
                Ok(order)
            }
            SettleOutcome::Rejected(order) => Err(AppError::VerificationFailed(format!(
                "order is not awaiting payment (payment status: {})",
                order.payment_status
            ))),
            SettleOutcome::NotFound => Err(AppError::NotFound("order")),
        }
    }

    /// Admin status overwrite, checked against the transition table
    /// unless the override flag is set.
    pub async fn update_status(
        &self,
        id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<Order, AppError> {
        let order = self.store.order(id).await?.ok_or(AppError::NotFound("order"))?;
        let next = request.status;
        if next != order.status
            && !request.override_transition
            && !order.status.can_transition_to(next)
        {
            return Err(AppError::IllegalTransition { from: order.status, to: next });
        }
        let updated = self
            .store
            .set_status(id, next)
            .await?
            .ok_or(AppError::NotFound("order"))?;
        self.events
            .publish(&OrderEvent::StatusChanged { order_id: id, status: next })
            .await;
        tracing::info!(order_number = %updated.order_number, status = %next, "order status updated");
        Ok(updated)
    }

    /// Price of the selected shipping method; an empty cart always ships
    /// for free regardless of the selection.
    pub async fn shipping_quote(&self, method_id: Uuid, item_count: u32) -> Result<i64, AppError> {
        if item_count == 0 {
            return Ok(0);
        }
        let method = self
            .store
            .shipping_method(method_id)
            .await?
            .ok_or(AppError::NotFound("shipping method"))?;
        Ok(method.price)
    }

    pub async fn order(&self, id: Uuid) -> Result<Order, AppError> {
        self.store.order(id).await?.ok_or(AppError::NotFound("order"))
    }

    pub async fn orders(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, i64), AppError> {
        Ok(self.store.orders(page, per_page).await?)
    }

    pub async fn shipping_methods(&self) -> Result<Vec<ShippingMethod>, AppError> {
        Ok(self.store.shipping_methods().await?)
    }

    async fn fail_settlement(&self, order_id: Uuid) -> Result<(), AppError> {
        if self.store.mark_payment_failed(order_id).await?.is_some() {
            self.events.publish(&OrderEvent::SettlementFailed { order_id }).await;
        }
        Ok(())
    }

    /// Best-effort: the customer has already paid, so inventory drift is
    /// tolerated and reconciled manually.
    async fn consume_stock(&self, order: &Order) {
        for item in order.items.iter() {
            let Some(product_id) = item.product_id else { continue };
            let quantity = item.quantity.unsigned_abs();
            if quantity == 0 {
                continue;
            }
            if let Err(err) = self.store.decrement_stock(product_id, quantity).await {
                tracing::error!(%product_id, quantity, error = %err, "stock decrement failed");
            }
        }
    }

    /// Queue the confirmation/alert emails for the outbox worker. The
    /// order is already settled; a queueing failure is only logged.
    async fn queue_notifications(&self, order: &Order, request: &VerifyPaymentRequest) {
        let admin_email = self.resolve_admin_email().await;
        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items.iter() {
            let image = match item.product_id {
                Some(product_id) => self.store.product_image(product_id).await.ok().flatten(),
                None => None,
            };
            items.push(OrderEmailItem {
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                price: item.price,
                image,
            });
        }
        let customer_email = if order.customer_email.is_empty() {
            request.customer_email.clone().unwrap_or_default()
        } else {
            order.customer_email.clone()
        };
        let customer_name = if order.customer_name.is_empty() {
            request.customer_name.clone().unwrap_or_else(|| "Customer".to_string())
        } else {
            order.customer_name.clone()
        };
        let data = OrderEmailData {
            order_number: order.order_number.clone(),
            customer_name,
            customer_email,
            items,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
            shipping_method: order.shipping_method.clone(),
            shipping_address: order.shipping_address.clone(),
        };
        let record = NotificationRecord::new(order.id, admin_email, data);
        if let Err(err) = self.store.enqueue_notification(&record).await {
            tracing::error!(order_number = %order.order_number, error = %err, "could not queue order notification");
        }
    }

    async fn resolve_admin_email(&self) -> String {
        let from_settings = match self.store.admin_email().await {
            Ok(email) => email,
            Err(err) => {
                tracing::warn!(error = %err, "admin settings lookup failed");
                None
            }
        };
        from_settings
            .or_else(|| self.admin_email.clone())
            .unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentStatus;
    use crate::payment::GatewayPayment;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    enum StubOutcome {
        Success { amount: i64 },
        Declined,
        Unreachable,
        NoCredentials,
    }

    #[derive(Clone)]
    struct StubVerifier {
        outcome: StubOutcome,
        calls: Arc<AtomicUsize>,
    }

    impl StubVerifier {
        fn success(amount: i64) -> Self {
            Self { outcome: StubOutcome::Success { amount }, calls: Arc::default() }
        }
        fn declined() -> Self {
            Self { outcome: StubOutcome::Declined, calls: Arc::default() }
        }
        fn unreachable() -> Self {
            Self { outcome: StubOutcome::Unreachable, calls: Arc::default() }
        }
        fn no_credentials() -> Self {
            Self { outcome: StubOutcome::NoCredentials, calls: Arc::default() }
        }
        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentVerifier for StubVerifier {
        async fn verify(&self, _reference: &str) -> Result<GatewayPayment, PaymentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                StubOutcome::Success { amount } => Ok(GatewayPayment {
                    success: true,
                    amount: *amount,
                    currency: "NGN".into(),
                }),
                StubOutcome::Declined => Ok(GatewayPayment {
                    success: false,
                    amount: 0,
                    currency: "NGN".into(),
                }),
                StubOutcome::Unreachable => {
                    Err(PaymentError::Gateway("connection refused".into()))
                }
                StubOutcome::NoCredentials => Err(PaymentError::MissingCredentials),
            }
        }
    }

    type TestWorkflow = OrderWorkflow<MemoryStore, StubVerifier>;

    fn workflow(store: MemoryStore, verifier: StubVerifier) -> TestWorkflow {
        OrderWorkflow::new(store, verifier, EventPublisher::disabled(), None)
    }

    async fn queued(store: &MemoryStore) -> Vec<NotificationRecord> {
        store.due_notifications(10).await.unwrap()
    }

    fn checkout_for(product_id: Option<Uuid>) -> Checkout {
        Checkout {
            customer_name: "Ada O.".into(),
            customer_email: "ada@example.com".into(),
            customer_phone: "+2348000000000".into(),
            shipping_address: "12 Marina Rd, Lagos".into(),
            items: vec![LineItem {
                product_id,
                product_name: "Silk Wig".into(),
                quantity: 2,
                price: 2000,
            }],
            shipping_method: "Lagos".into(),
            shipping_cost: 500,
            subtotal: 4000,
            total: 4500,
        }
    }

    fn verify_request(order: &Order, reference: &str) -> VerifyPaymentRequest {
        VerifyPaymentRequest {
            reference: Some(reference.to_string()),
            order_id: Some(order.id),
            customer_email: None,
            customer_name: None,
        }
    }

    #[tokio::test]
    async fn test_create_order_starts_unpaid() {
        let wf = workflow(MemoryStore::new(), StubVerifier::success(0));
        let order = wf.create_order(checkout_for(None)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total, order.subtotal + order.shipping_cost);
        assert!(order.order_number.starts_with("MH-"));
    }

    #[tokio::test]
    async fn test_create_order_rejects_total_mismatch() {
        let wf = workflow(MemoryStore::new(), StubVerifier::success(0));
        let mut checkout = checkout_for(None);
        checkout.total = 9999;
        let err = wf.create_order(checkout).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_order_rejects_subtotal_mismatch() {
        let wf = workflow(MemoryStore::new(), StubVerifier::success(0));
        let mut checkout = checkout_for(None);
        checkout.subtotal = 100;
        checkout.total = 600;
        let err = wf.create_order(checkout).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_order_rejects_empty_cart() {
        let wf = workflow(MemoryStore::new(), StubVerifier::success(0));
        let mut checkout = checkout_for(None);
        checkout.items.clear();
        checkout.subtotal = 0;
        checkout.total = 500;
        let err = wf.create_order(checkout).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_order_rejects_nonpositive_quantity() {
        let wf = workflow(MemoryStore::new(), StubVerifier::success(0));
        let mut checkout = checkout_for(None);
        checkout.items[0].quantity = 0;
        let err = wf.create_order(checkout).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_order_rejects_invalid_email() {
        let wf = workflow(MemoryStore::new(), StubVerifier::success(0));
        let mut checkout = checkout_for(None);
        checkout.customer_email = "not-an-email".into();
        let err = wf.create_order(checkout).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_settlement_success_path() {
        let store = MemoryStore::new();
        let product_id = store.add_product("Silk Wig", 2000, 10, vec!["https://cdn/wig.jpg".into()]);
        let verifier = StubVerifier::success(450_000);
        let wf = workflow(store.clone(), verifier.clone());

        let order = wf.create_order(checkout_for(Some(product_id))).await.unwrap();
        let settled = wf.settle_payment(verify_request(&order, "REF123")).await.unwrap();

        assert_eq!(settled.status, OrderStatus::Processing);
        assert_eq!(settled.payment_status, PaymentStatus::Completed);
        assert_eq!(settled.payment_reference.as_deref(), Some("REF123"));
        assert_eq!(store.product_stock(product_id), Some(8));
        assert_eq!(verifier.call_count(), 1);

        let records = queued(&store).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].admin_email, "admin@metahair.com");
        assert_eq!(records[0].order_id, settled.id);
        assert_eq!(records[0].payload.order_number, settled.order_number);
        assert_eq!(records[0].payload.items[0].image.as_deref(), Some("https://cdn/wig.jpg"));
    }

    #[tokio::test]
    async fn test_settlement_declined_by_gateway() {
        let store = MemoryStore::new();
        let product_id = store.add_product("Silk Wig", 2000, 10, vec![]);
        let wf = workflow(store.clone(), StubVerifier::declined());

        let order = wf.create_order(checkout_for(Some(product_id))).await.unwrap();
        let err = wf.settle_payment(verify_request(&order, "REF123")).await.unwrap_err();
        assert!(matches!(err, AppError::VerificationFailed(_)));

        let current = wf.order(order.id).await.unwrap();
        assert_eq!(current.status, OrderStatus::Cancelled);
        assert_eq!(current.payment_status, PaymentStatus::Failed);
        assert_eq!(store.product_stock(product_id), Some(10));
        assert!(queued(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_settlement_gateway_error_is_terminal() {
        let store = MemoryStore::new();
        let wf = workflow(store.clone(), StubVerifier::unreachable());
        let order = wf.create_order(checkout_for(None)).await.unwrap();

        let err = wf.settle_payment(verify_request(&order, "REF123")).await.unwrap_err();
        assert!(matches!(err, AppError::VerificationFailed(_)));
        let current = wf.order(order.id).await.unwrap();
        assert_eq!(current.status, OrderStatus::Cancelled);
        assert_eq!(current.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_settlement_amount_mismatch_fails() {
        let store = MemoryStore::new();
        let product_id = store.add_product("Silk Wig", 2000, 10, vec![]);
        // Gateway confirms a different amount than the order total.
        let wf = workflow(store.clone(), StubVerifier::success(100));

        let order = wf.create_order(checkout_for(Some(product_id))).await.unwrap();
        let err = wf.settle_payment(verify_request(&order, "REF123")).await.unwrap_err();
        assert!(matches!(err, AppError::VerificationFailed(_)));

        let current = wf.order(order.id).await.unwrap();
        assert_eq!(current.payment_status, PaymentStatus::Failed);
        assert_eq!(store.product_stock(product_id), Some(10));
    }

    #[tokio::test]
    async fn test_settlement_rejects_missing_inputs_before_gateway() {
        let store = MemoryStore::new();
        let verifier = StubVerifier::success(450_000);
        let wf = workflow(store.clone(), verifier.clone());
        let order = wf.create_order(checkout_for(None)).await.unwrap();

        for request in [
            VerifyPaymentRequest {
                reference: None,
                order_id: Some(order.id),
                customer_email: None,
                customer_name: None,
            },
            VerifyPaymentRequest {
                reference: Some("  ".into()),
                order_id: Some(order.id),
                customer_email: None,
                customer_name: None,
            },
            VerifyPaymentRequest {
                reference: Some("REF123".into()),
                order_id: None,
                customer_email: None,
                customer_name: None,
            },
        ] {
            let err = wf.settle_payment(request).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        assert_eq!(verifier.call_count(), 0);
        let current = wf.order(order.id).await.unwrap();
        assert_eq!(current.status, OrderStatus::Pending);
        assert_eq!(current.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_settlement_replay_is_convergent() {
        let store = MemoryStore::new();
        let product_id = store.add_product("Silk Wig", 2000, 10, vec![]);
        let verifier = StubVerifier::success(450_000);
        let wf = workflow(store.clone(), verifier.clone());

        let order = wf.create_order(checkout_for(Some(product_id))).await.unwrap();
        let first = wf.settle_payment(verify_request(&order, "REF123")).await.unwrap();
        let second = wf.settle_payment(verify_request(&order, "REF123")).await.unwrap();

        assert_eq!(second.status, OrderStatus::Processing);
        assert_eq!(second.payment_status, PaymentStatus::Completed);
        assert_eq!(second.payment_reference, first.payment_reference);
        // The replay must not consume stock or queue mail again.
        assert_eq!(store.product_stock(product_id), Some(8));
        assert_eq!(queued(&store).await.len(), 1);
        assert_eq!(verifier.call_count(), 2);
    }

    #[tokio::test]
    async fn test_settlement_fails_closed_without_credentials() {
        let store = MemoryStore::new();
        let wf = workflow(store.clone(), StubVerifier::no_credentials());
        let order = wf.create_order(checkout_for(None)).await.unwrap();

        let err = wf.settle_payment(verify_request(&order, "REF123")).await.unwrap_err();
        assert!(matches!(err, AppError::Gateway(PaymentError::MissingCredentials)));

        // No mutation: the gateway was never actually consulted.
        let current = wf.order(order.id).await.unwrap();
        assert_eq!(current.status, OrderStatus::Pending);
        assert_eq!(current.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_settlement_no_resume_after_failure() {
        let store = MemoryStore::new();
        let product_id = store.add_product("Silk Wig", 2000, 10, vec![]);
        let wf = workflow(store.clone(), StubVerifier::declined());
        let order = wf.create_order(checkout_for(Some(product_id))).await.unwrap();
        wf.settle_payment(verify_request(&order, "REF1")).await.unwrap_err();

        // A later successful verification cannot revive the cancelled order.
        let wf = workflow(store.clone(), StubVerifier::success(450_000));
        let err = wf.settle_payment(verify_request(&order, "REF2")).await.unwrap_err();
        assert!(matches!(err, AppError::VerificationFailed(_)));
        assert_eq!(store.product_stock(product_id), Some(10));
        assert!(queued(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_admin_email_resolution_order() {
        // Settings record wins over the env fallback and the default.
        let store = MemoryStore::new();
        store.set_admin_email("boss@metahair.com");
        let wf = OrderWorkflow::new(
            store.clone(),
            StubVerifier::success(450_000),
            EventPublisher::disabled(),
            Some("ops@metahair.com".into()),
        );
        let order = wf.create_order(checkout_for(None)).await.unwrap();
        wf.settle_payment(verify_request(&order, "REF123")).await.unwrap();
        assert_eq!(queued(&store).await[0].admin_email, "boss@metahair.com");

        // Env fallback when no settings record exists.
        let store = MemoryStore::new();
        let wf = OrderWorkflow::new(
            store.clone(),
            StubVerifier::success(450_000),
            EventPublisher::disabled(),
            Some("ops@metahair.com".into()),
        );
        let order = wf.create_order(checkout_for(None)).await.unwrap();
        wf.settle_payment(verify_request(&order, "REF124")).await.unwrap();
        assert_eq!(queued(&store).await[0].admin_email, "ops@metahair.com");
    }

    #[tokio::test]
    async fn test_update_status_sets_only_status() {
        let store = MemoryStore::new();
        let wf = workflow(store.clone(), StubVerifier::success(450_000));
        let order = wf.create_order(checkout_for(None)).await.unwrap();
        wf.settle_payment(verify_request(&order, "REF123")).await.unwrap();
        let before = wf.order(order.id).await.unwrap();

        let updated = wf
            .update_status(
                order.id,
                UpdateStatusRequest { status: OrderStatus::Shipped, override_transition: false },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Shipped);

        let mut was = serde_json::to_value(&before).unwrap();
        let mut now = serde_json::to_value(&updated).unwrap();
        for field in ["status", "updatedAt"] {
            was.as_object_mut().unwrap().remove(field);
            now.as_object_mut().unwrap().remove(field);
        }
        assert_eq!(was, now);
    }

    #[tokio::test]
    async fn test_update_status_enforces_transition_table() {
        let store = MemoryStore::new();
        let wf = workflow(store, StubVerifier::success(0));
        let order = wf.create_order(checkout_for(None)).await.unwrap();

        let err = wf
            .update_status(
                order.id,
                UpdateStatusRequest { status: OrderStatus::Delivered, override_transition: false },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition { .. }));

        let forced = wf
            .update_status(
                order.id,
                UpdateStatusRequest { status: OrderStatus::Delivered, override_transition: true },
            )
            .await
            .unwrap();
        assert_eq!(forced.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_shipping_quote() {
        let store = MemoryStore::new();
        let method_id = store.add_shipping_method("Lagos", 500);
        let wf = workflow(store, StubVerifier::success(0));

        assert_eq!(wf.shipping_quote(method_id, 3).await.unwrap(), 500);
        // Empty carts ship for free no matter what is selected.
        assert_eq!(wf.shipping_quote(method_id, 0).await.unwrap(), 0);

        let err = wf.shipping_quote(Uuid::now_v7(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
