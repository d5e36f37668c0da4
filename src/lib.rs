//! Meta Hair Commerce - storefront backend.
//!
//! The heart of the service is the order lifecycle: checkout creates a
//! pending order from a cart snapshot, the Paystack gateway confirms the
//! payment, and settlement transitions the order, consumes stock, and
//! dispatches confirmation emails.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod notify;
pub mod outbox;
pub mod payment;
pub mod store;
pub mod workflow;

pub use error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
