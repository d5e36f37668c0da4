//! Order notification emails, sent through the Resend HTTP API.
//!
//! Senders are driven by the outbox worker, never by request handlers:
//! a failed send is retried later and cannot fail the request that
//! queued it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

const RESEND_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail credentials are not configured")]
    MissingCredentials,
    #[error("mail request failed: {0}")]
    Request(String),
    #[error("mail API rejected the message: {0}")]
    Api(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderEmailItem {
    pub product_name: String,
    pub quantity: i32,
    pub price: i64,
    pub image: Option<String>,
}

/// Everything the templates need, assembled by the workflow at settlement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderEmailData {
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<OrderEmailItem>,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub shipping_method: String,
    pub shipping_address: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the customer confirmation and the admin alert for one order.
    async fn send_order_confirmation(
        &self,
        admin_email: &str,
        data: &OrderEmailData,
    ) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: Option<String>,
    from: String,
    app_base_url: String,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, from: String, app_base_url: String) -> Self {
        Self { http: reqwest::Client::new(), api_key, from, app_base_url }
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        let key = self.api_key.as_deref().ok_or(NotifyError::MissingCredentials)?;
        let response = self
            .http
            .post(RESEND_URL)
            .bearer_auth(key)
            .json(&json!({ "from": self.from, "to": to, "subject": subject, "html": html }))
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api(format!("{status}: {body}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for ResendMailer {
    async fn send_order_confirmation(
        &self,
        admin_email: &str,
        data: &OrderEmailData,
    ) -> Result<(), NotifyError> {
        self.send(
            &data.customer_email,
            &format!("Order Confirmation - {}", data.order_number),
            &customer_html(data),
        )
        .await?;
        self.send(
            admin_email,
            &format!("New Order - {}", data.order_number),
            &admin_html(data, &self.app_base_url),
        )
        .await
    }
}

fn item_rows(items: &[OrderEmailItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "<li>{} x{} - ₦{}</li>",
                item.product_name, item.quantity, item.price
            )
        })
        .collect()
}

pub fn customer_html(data: &OrderEmailData) -> String {
    format!(
        "<h2>Thank you for your order!</h2>\
         <p>Order Number: {}</p>\
         <h3>Order Summary:</h3>\
         <ul>{}</ul>\
         <p>Shipping: ₦{}</p>\
         <p><strong>Total: ₦{}</strong></p>\
         <p>Shipping Method: {}</p>\
         <p>Shipping Address: {}</p>",
        data.order_number,
        item_rows(&data.items),
        data.shipping_cost,
        data.total,
        data.shipping_method,
        data.shipping_address,
    )
}

pub fn admin_html(data: &OrderEmailData, app_base_url: &str) -> String {
    format!(
        "<h2>New Order Received</h2>\
         <p>Customer: {}</p>\
         <p>Email: {}</p>\
         <p>Order Number: {}</p>\
         <h3>Order Summary:</h3>\
         <ul>{}</ul>\
         <p><strong>Total: ₦{}</strong></p>\
         <p>Shipping Method: {}</p>\
         <p><a href=\"{}/admin/dashboard\">View Order in Dashboard</a></p>",
        data.customer_name,
        data.customer_email,
        data.order_number,
        item_rows(&data.items),
        data.total,
        data.shipping_method,
        app_base_url,
    )
}
