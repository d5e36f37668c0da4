//! Postgres-backed store.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::catalog::ShippingMethod;
use crate::domain::order::{Order, OrderStatus, PaymentStatus};
use crate::outbox::{NotificationRecord, MAX_ATTEMPTS};
use crate::store::{CatalogStore, OrderStore, OutboxStore, SettingsStore, SettleOutcome, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<Order, StoreError> {
        let created = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, order_number, customer_name, customer_email, customer_phone, shipping_address, items, shipping_method, shipping_cost, subtotal, total, status, payment_status, payment_reference, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING *",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(&order.shipping_address)
        .bind(&order.items)
        .bind(&order.shipping_method)
        .bind(order.shipping_cost)
        .bind(order.subtotal)
        .bind(order.total)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(&order.payment_reference)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn orders(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, i64), StoreError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(per_page as i64)
        .bind(((page.max(1) - 1) * per_page) as i64)
        .fetch_all(&self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok((orders, total.0))
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn settle_payment(&self, id: Uuid, reference: &str) -> Result<SettleOutcome, StoreError> {
        // Single conditional statement; the WHERE clause is the only gate
        // against concurrent verification callbacks for the same order.
        let settled = sqlx::query_as::<_, Order>(
            "UPDATE orders SET payment_status = 'completed', status = 'processing', payment_reference = $2, updated_at = NOW() \
             WHERE id = $1 AND payment_status = 'pending' RETURNING *",
        )
        .bind(id)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(order) = settled {
            return Ok(SettleOutcome::Settled(order));
        }
        match self.order(id).await? {
            Some(order) if order.payment_status == PaymentStatus::Completed => {
                Ok(SettleOutcome::AlreadySettled(order))
            }
            Some(order) => Ok(SettleOutcome::Rejected(order)),
            None => Ok(SettleOutcome::NotFound),
        }
    }

    async fn mark_payment_failed(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(
            "UPDATE orders SET payment_status = 'failed', status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND payment_status = 'pending' RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn decrement_stock(&self, product_id: Uuid, quantity: u32) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(quantity as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn product_image(&self, product_id: Uuid) -> Result<Option<String>, StoreError> {
        let images: Option<(Vec<String>,)> =
            sqlx::query_as("SELECT images FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(images.and_then(|(imgs,)| imgs.into_iter().next()))
    }

    async fn shipping_method(&self, id: Uuid) -> Result<Option<ShippingMethod>, StoreError> {
        let method =
            sqlx::query_as::<_, ShippingMethod>("SELECT * FROM shipping_methods WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(method)
    }

    async fn shipping_methods(&self) -> Result<Vec<ShippingMethod>, StoreError> {
        let methods = sqlx::query_as::<_, ShippingMethod>(
            "SELECT * FROM shipping_methods ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(methods)
    }
}

#[async_trait]
impl OutboxStore for PgStore {
    async fn enqueue_notification(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notification_outbox (id, order_id, admin_email, payload, attempts, last_error, sent_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(record.order_id)
        .bind(&record.admin_email)
        .bind(&record.payload)
        .bind(record.attempts)
        .bind(&record.last_error)
        .bind(record.sent_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn due_notifications(&self, limit: u32) -> Result<Vec<NotificationRecord>, StoreError> {
        let due = sqlx::query_as::<_, NotificationRecord>(
            "SELECT * FROM notification_outbox WHERE sent_at IS NULL AND attempts < $2 ORDER BY created_at LIMIT $1",
        )
        .bind(limit as i64)
        .bind(MAX_ATTEMPTS)
        .fetch_all(&self.pool)
        .await?;
        Ok(due)
    }

    async fn mark_notification_sent(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE notification_outbox SET sent_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_notification_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE notification_outbox SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn admin_email(&self) -> Result<Option<String>, StoreError> {
        let email: Option<(String,)> =
            sqlx::query_as("SELECT admin_email FROM store_settings LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(email.map(|(e,)| e))
    }
}
