//! Storage interfaces for the order workflow.
//!
//! The Postgres implementation backs the running service; the in-memory
//! implementation backs tests and local development.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::catalog::ShippingMethod;
use crate::domain::order::{Order, OrderStatus};
use crate::outbox::NotificationRecord;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Duplicate(db.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Result of the conditional settlement write. The `pending -> completed`
/// guard is a single atomic operation, so exactly one caller observes
/// `Settled` for a given order.
#[derive(Clone, Debug)]
pub enum SettleOutcome {
    /// This call won the transition; stock consumption and notification
    /// belong to it.
    Settled(Order),
    /// A previous call already completed payment; convergent replay.
    AlreadySettled(Order),
    /// The order exists but is not awaiting payment (e.g. already failed).
    Rejected(Order),
    NotFound,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<Order, StoreError>;

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Newest-first page of orders plus the total count.
    async fn orders(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, i64), StoreError>;

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Option<Order>, StoreError>;

    /// Set `(processing, completed)` and stamp the payment reference, but
    /// only if the payment status is still `pending`.
    async fn settle_payment(&self, id: Uuid, reference: &str) -> Result<SettleOutcome, StoreError>;

    /// Set `(cancelled, failed)` if the payment status is still `pending`.
    /// Returns the updated order, or `None` when no transition happened.
    async fn mark_payment_failed(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Decrement a product's stock. Missing products are ignored: line
    /// items hold weak references.
    async fn decrement_stock(&self, product_id: Uuid, quantity: u32) -> Result<(), StoreError>;

    /// Representative image for a product, if it has any.
    async fn product_image(&self, product_id: Uuid) -> Result<Option<String>, StoreError>;

    async fn shipping_method(&self, id: Uuid) -> Result<Option<ShippingMethod>, StoreError>;

    async fn shipping_methods(&self) -> Result<Vec<ShippingMethod>, StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Admin notification address from the persisted settings record.
    async fn admin_email(&self) -> Result<Option<String>, StoreError>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn enqueue_notification(&self, record: &NotificationRecord) -> Result<(), StoreError>;

    /// Unsent records with attempt budget remaining, oldest first.
    async fn due_notifications(&self, limit: u32) -> Result<Vec<NotificationRecord>, StoreError>;

    async fn mark_notification_sent(&self, id: Uuid) -> Result<(), StoreError>;

    async fn mark_notification_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError>;
}
