//! Order manager error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid order configuration: {0}")]
    Config(String),

    #[error("Trading rules unavailable: {0}")]
    Rules(#[from] spotbot_exchange::ExchangeError),
}

pub type OrderResult<T> = Result<T, OrderError>;
