//! Order model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Fulfillment status. Transitions are checked against an explicit table;
/// admin updates may bypass it with an override flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    /// Transitions reachable without the admin override flag.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A product snapshot captured at checkout. `product_id` is a weak
/// reference: the catalog entry may change or disappear without
/// affecting the order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub price: i64,
}

impl LineItem {
    pub fn line_total(&self) -> i64 {
        self.price * self.quantity as i64
    }
}

/// Flattened cart snapshot submitted at checkout, together with the
/// customer's contact and shipping details. Prices are trusted snapshots;
/// the arithmetic between them is re-checked before an order is created.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub shipping_address: String,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub shipping_method: String,
    #[serde(default)]
    pub shipping_cost: i64,
    pub subtotal: i64,
    pub total: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub items: Json<Vec<LineItem>>,
    pub shipping_method: String,
    pub shipping_cost: i64,
    pub subtotal: i64,
    pub total: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a fresh unpaid order from a checkout snapshot. Stock is not
    /// touched here; it is only consumed once payment is confirmed.
    pub fn from_checkout(checkout: Checkout) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            order_number: generate_order_number(),
            customer_name: checkout.customer_name,
            customer_email: checkout.customer_email,
            customer_phone: checkout.customer_phone,
            shipping_address: checkout.shipping_address,
            items: Json(checkout.items),
            shipping_method: checkout.shipping_method,
            shipping_cost: checkout.shipping_cost,
            subtotal: checkout.subtotal,
            total: checkout.total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Order total in kobo, the gateway's smallest currency unit.
    pub fn total_kobo(&self) -> i64 {
        self.total * 100
    }
}

/// Human-readable order number: `MH-` plus the creation timestamp in
/// milliseconds and a random suffix guarding against same-millisecond
/// collisions. The orders table carries a unique index as the backstop.
pub fn generate_order_number() -> String {
    let ms = Utc::now().timestamp_millis();
    format!("MH-{}{:03}", ms, rand::random::<u32>() % 1000)
}
