//! Paystack transaction verification.
//!
//! The gateway is treated as an oracle: given a payment reference it
//! answers whether the transaction succeeded and for how much (in kobo).

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

const PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway credentials are not configured")]
    MissingCredentials,
    #[error("payment gateway request failed: {0}")]
    Gateway(String),
}

/// Gateway's answer for one payment reference.
#[derive(Clone, Debug)]
pub struct GatewayPayment {
    pub success: bool,
    /// Amount in the gateway's smallest currency unit (kobo).
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, reference: &str) -> Result<GatewayPayment, PaymentError>;
}

#[derive(Clone)]
pub struct PaystackVerifier {
    http: reqwest::Client,
    secret_key: Option<String>,
}

impl PaystackVerifier {
    pub fn new(secret_key: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), secret_key }
    }
}

#[async_trait]
impl PaymentVerifier for PaystackVerifier {
    async fn verify(&self, reference: &str) -> Result<GatewayPayment, PaymentError> {
        let key = self.secret_key.as_deref().ok_or(PaymentError::MissingCredentials)?;

        let response = self
            .http
            .get(format!("{PAYSTACK_BASE_URL}/transaction/verify/{reference}"))
            .bearer_auth(key)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let http_ok = response.status().is_success();
        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(format!("unreadable response: {e}")))?;

        let transaction = body.data.unwrap_or_default();
        Ok(GatewayPayment {
            success: http_ok && body.status && transaction.status == "success",
            amount: transaction.amount,
            currency: transaction.currency,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    #[serde(default)]
    status: String,
    #[serde(default)]
    amount: i64,
    #[serde(default = "default_currency")]
    currency: String,
}

impl Default for VerifyData {
    fn default() -> Self {
        Self { status: String::new(), amount: 0, currency: default_currency() }
    }
}

fn default_currency() -> String {
    "NGN".to_string()
}
