//! Order lifecycle events, published to NATS when a broker is configured.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::order::OrderStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, order_number: String, total: i64 },
    Settled { order_id: Uuid, order_number: String, payment_reference: String },
    SettlementFailed { order_id: Uuid },
    StatusChanged { order_id: Uuid, status: OrderStatus },
}

impl OrderEvent {
    fn subject(&self) -> &'static str {
        match self {
            OrderEvent::Created { .. } => "orders.created",
            OrderEvent::Settled { .. } => "orders.settled",
            OrderEvent::SettlementFailed { .. } => "orders.settlement_failed",
            OrderEvent::StatusChanged { .. } => "orders.status_changed",
        }
    }
}

/// Best-effort publisher; a missing broker or a failed publish never
/// affects the request that raised the event.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    pub fn disabled() -> Self {
        Self { nats: None }
    }

    pub async fn publish(&self, event: &OrderEvent) {
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "could not serialize order event");
                return;
            }
        };
        if let Err(err) = client.publish(event.subject(), payload.into()).await {
            tracing::warn!(error = %err, subject = event.subject(), "order event publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = OrderEvent::StatusChanged {
            order_id: Uuid::nil(),
            status: OrderStatus::Shipped,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["status"], "shipped");
        assert_eq!(event.subject(), "orders.status_changed");
    }
}
