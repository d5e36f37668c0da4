//! Notification outbox.
//!
//! Settlement never emails inline: it enqueues a record here, in the same
//! store that holds the order, and the worker drains the queue in the
//! background. A crashed send is retried on the next tick until the
//! attempt budget runs out.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::notify::{Notifier, OrderEmailData};
use crate::store::OutboxStore;

/// Sends are abandoned after this many failed attempts; the record stays
/// behind with its last error for manual follow-up.
pub const MAX_ATTEMPTS: i32 = 5;

pub const DISPATCH_BATCH: u32 = 20;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub admin_email: String,
    pub payload: Json<OrderEmailData>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn new(order_id: Uuid, admin_email: String, payload: OrderEmailData) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            admin_email,
            payload: Json(payload),
            attempts: 0,
            last_error: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }
}

pub struct NotificationWorker<S, N> {
    store: S,
    notifier: N,
    poll_interval: Duration,
}

impl<S, N> NotificationWorker<S, N>
where
    S: OutboxStore,
    N: Notifier,
{
    pub fn new(store: S, notifier: N, poll_interval: Duration) -> Self {
        Self { store, notifier, poll_interval }
    }

    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.poll_interval);
        loop {
            tick.tick().await;
            self.drain_once().await;
        }
    }

    /// One dispatch pass; returns how many records were sent.
    pub async fn drain_once(&self) -> usize {
        let due = match self.store.due_notifications(DISPATCH_BATCH).await {
            Ok(due) => due,
            Err(err) => {
                tracing::error!(error = %err, "outbox poll failed");
                return 0;
            }
        };
        let mut sent = 0;
        for record in due {
            match self
                .notifier
                .send_order_confirmation(&record.admin_email, &record.payload)
                .await
            {
                Ok(()) => {
                    if let Err(err) = self.store.mark_notification_sent(record.id).await {
                        tracing::error!(record_id = %record.id, error = %err, "could not mark notification sent");
                    } else {
                        sent += 1;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        record_id = %record.id,
                        order_id = %record.order_id,
                        attempts = record.attempts + 1,
                        error = %err,
                        "notification send failed"
                    );
                    if let Err(mark_err) = self
                        .store
                        .mark_notification_failed(record.id, &err.to_string())
                        .await
                    {
                        tracing::error!(record_id = %record.id, error = %mark_err, "could not record notification failure");
                    }
                }
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct FlakyNotifier {
        failing: Arc<AtomicBool>,
        sends: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send_order_confirmation(
            &self,
            _admin_email: &str,
            _data: &OrderEmailData,
        ) -> Result<(), NotifyError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(NotifyError::Request("connection reset".into()));
            }
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record() -> NotificationRecord {
        NotificationRecord::new(
            Uuid::now_v7(),
            "admin@metahair.com".into(),
            OrderEmailData {
                order_number: "MH-1719320000000".into(),
                customer_name: "Ada O.".into(),
                customer_email: "ada@example.com".into(),
                items: vec![],
                subtotal: 4000,
                shipping_cost: 500,
                total: 4500,
                shipping_method: "Lagos".into(),
                shipping_address: "12 Marina Rd, Lagos".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_drain_sends_and_marks() {
        let store = MemoryStore::new();
        store.enqueue_notification(&record()).await.unwrap();
        let notifier = FlakyNotifier::default();
        let worker = NotificationWorker::new(store.clone(), notifier.clone(), Duration::from_secs(30));

        assert_eq!(worker.drain_once().await, 1);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
        // Nothing left to send on the next pass.
        assert_eq!(worker.drain_once().await, 0);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_send_is_retried_until_budget_runs_out() {
        let store = MemoryStore::new();
        store.enqueue_notification(&record()).await.unwrap();
        let notifier = FlakyNotifier::default();
        notifier.failing.store(true, Ordering::SeqCst);
        let worker = NotificationWorker::new(store.clone(), notifier.clone(), Duration::from_secs(30));

        for _ in 0..MAX_ATTEMPTS {
            assert_eq!(worker.drain_once().await, 0);
        }
        // Budget exhausted: the record is no longer due.
        assert!(store.due_notifications(10).await.unwrap().is_empty());

        notifier.failing.store(false, Ordering::SeqCst);
        assert_eq!(worker.drain_once().await, 0);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recovery_after_transient_failure() {
        let store = MemoryStore::new();
        store.enqueue_notification(&record()).await.unwrap();
        let notifier = FlakyNotifier::default();
        notifier.failing.store(true, Ordering::SeqCst);
        let worker = NotificationWorker::new(store.clone(), notifier.clone(), Duration::from_secs(30));

        worker.drain_once().await;
        let due = store.due_notifications(10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 1);
        assert!(due[0].last_error.as_deref().unwrap().contains("connection reset"));

        notifier.failing.store(false, Ordering::SeqCst);
        assert_eq!(worker.drain_once().await, 1);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }
}
