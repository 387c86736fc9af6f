//! # Error Types Module
//!
//! Structured errors for the shop core. Storage, provider and webhook
//! verification failures each get their own enum so callers can map them to
//! the right HTTP status or bot message.

use uuid::Uuid;

use crate::order_lifecycle::OrderStatus;

/// Errors raised by shop operations (catalog, cart, checkout, collection)
#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    /// A referenced row does not exist or is not visible to the caller
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    /// Checkout was attempted on a cart without items
    #[error("cart {0} is empty")]
    EmptyCart(Uuid),
    /// Input rejected before touching the store
    #[error("validation error: {0}")]
    Validation(String),
    /// Unique constraint violated (e.g. duplicate bot token)
    #[error("conflict: {0}")]
    Conflict(String),
    /// Order status change not allowed by the lifecycle table
    #[error("illegal order transition {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    /// Backing store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Payment provider failure
    #[error("payment provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl ShopError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ShopError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Errors from the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("duplicate value: {0}")]
    Duplicate(String),
    #[error("missing referenced row: {0}")]
    MissingReference(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Errors from the payment provider client
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("payment provider is not configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("circuit breaker open, provider calls suspended")]
    CircuitOpen,
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

/// Reasons an IPN callback is refused before any processing
#[derive(Debug, thiserror::Error)]
pub enum IpnError {
    #[error("IPN secret is not configured")]
    MissingSecret,
    #[error("signature header missing")]
    MissingSignature,
    #[error("signature mismatch")]
    InvalidSignature,
    #[error("invalid payload: {0}")]
    Payload(String),
}
