//! Environment-driven configuration.

use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub nats_url: Option<String>,
    /// Paystack secret key; verification fails closed without it.
    pub paystack_secret_key: Option<String>,
    /// Resend API key; notifications are skipped without it.
    pub resend_api_key: Option<String>,
    /// Env-level fallback for the admin notification address.
    pub admin_email: Option<String>,
    pub mail_from: String,
    pub app_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL is not set".into()))?;
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("invalid PORT: {e}")))?;

        Ok(Self {
            port,
            database_url,
            nats_url: env::var("NATS_URL").ok(),
            paystack_secret_key: env::var("PAYSTACK_SECRET_KEY").ok(),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            mail_from: env::var("MAIL_FROM").unwrap_or_else(|_| "orders@metahair.com".to_string()),
            app_base_url: env::var("APP_BASE_URL").unwrap_or_else(|_| "https://metahair.com".to_string()),
        })
    }
}
