//! Error types for spotbot-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid trading rules: {0}")]
    InvalidRules(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
