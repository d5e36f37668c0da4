//! HashMap-backed store for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::catalog::{Product, ShippingMethod};
use crate::domain::order::{Order, OrderStatus, PaymentStatus};
use crate::outbox::{NotificationRecord, MAX_ATTEMPTS};
use crate::store::{CatalogStore, OrderStore, OutboxStore, SettingsStore, SettleOutcome, StoreError};

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    products: HashMap<Uuid, Product>,
    shipping_methods: Vec<ShippingMethod>,
    admin_email: Option<String>,
    outbox: Vec<NotificationRecord>,
}

/// Clone-friendly via Arc; all operations take the lock briefly and never
/// hold it across an await point.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> StoreError {
        StoreError::Backend("lock poisoned".into())
    }

    pub fn add_product(&self, name: &str, price: i64, stock: i32, images: Vec<String>) -> Uuid {
        let now = Utc::now();
        let product = Product {
            id: Uuid::now_v7(),
            name: name.to_string(),
            description: None,
            price,
            images,
            stock,
            featured: false,
            created_at: now,
            updated_at: now,
        };
        let id = product.id;
        self.inner.write().unwrap().products.insert(id, product);
        id
    }

    pub fn add_shipping_method(&self, name: &str, price: i64) -> Uuid {
        let now = Utc::now();
        let method = ShippingMethod {
            id: Uuid::now_v7(),
            name: name.to_string(),
            price,
            description: None,
            estimated_days: Some(3),
            created_at: now,
            updated_at: now,
        };
        let id = method.id;
        self.inner.write().unwrap().shipping_methods.push(method);
        id
    }

    pub fn set_admin_email(&self, email: &str) {
        self.inner.write().unwrap().admin_email = Some(email.to_string());
    }

    pub fn product_stock(&self, id: Uuid) -> Option<i32> {
        self.inner.read().unwrap().products.get(&id).map(|p| p.stock)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<Order, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        if inner.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Duplicate(order.order_number.clone()));
        }
        inner.orders.insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        Ok(inner.orders.get(&id).cloned())
    }

    async fn orders(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, i64), StoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        let mut all: Vec<Order> = inner.orders.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = all.len() as i64;
        let skip = (page.max(1) as usize - 1) * per_page as usize;
        let pageful = all.into_iter().skip(skip).take(per_page as usize).collect();
        Ok((pageful, total))
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Option<Order>, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        Ok(inner.orders.get_mut(&id).map(|order| {
            order.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn settle_payment(&self, id: Uuid, reference: &str) -> Result<SettleOutcome, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        let Some(order) = inner.orders.get_mut(&id) else {
            return Ok(SettleOutcome::NotFound);
        };
        match order.payment_status {
            PaymentStatus::Pending => {
                order.payment_status = PaymentStatus::Completed;
                order.status = OrderStatus::Processing;
                order.payment_reference = Some(reference.to_string());
                order.updated_at = Utc::now();
                Ok(SettleOutcome::Settled(order.clone()))
            }
            PaymentStatus::Completed => Ok(SettleOutcome::AlreadySettled(order.clone())),
            PaymentStatus::Failed => Ok(SettleOutcome::Rejected(order.clone())),
        }
    }

    async fn mark_payment_failed(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        let Some(order) = inner.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.payment_status != PaymentStatus::Pending {
            return Ok(None);
        }
        order.payment_status = PaymentStatus::Failed;
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn decrement_stock(&self, product_id: Uuid, quantity: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        if let Some(product) = inner.products.get_mut(&product_id) {
            product.stock -= quantity as i32;
            product.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn product_image(&self, product_id: Uuid) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        Ok(inner
            .products
            .get(&product_id)
            .and_then(|p| p.images.first().cloned()))
    }

    async fn shipping_method(&self, id: Uuid) -> Result<Option<ShippingMethod>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        Ok(inner.shipping_methods.iter().find(|m| m.id == id).cloned())
    }

    async fn shipping_methods(&self) -> Result<Vec<ShippingMethod>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        Ok(inner.shipping_methods.clone())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn admin_email(&self) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        Ok(inner.admin_email.clone())
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn enqueue_notification(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        inner.outbox.push(record.clone());
        Ok(())
    }

    async fn due_notifications(&self, limit: u32) -> Result<Vec<NotificationRecord>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        let mut due: Vec<NotificationRecord> = inner
            .outbox
            .iter()
            .filter(|r| r.sent_at.is_none() && r.attempts < MAX_ATTEMPTS)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn mark_notification_sent(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        if let Some(record) = inner.outbox.iter_mut().find(|r| r.id == id) {
            record.sent_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_notification_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        if let Some(record) = inner.outbox.iter_mut().find(|r| r.id == id) {
            record.attempts += 1;
            record.last_error = Some(error.to_string());
        }
        Ok(())
    }
}
