//! Strategy error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Market data unavailable: {0}")]
    DataUnavailable(#[from] spotbot_exchange::ExchangeError),
}

pub type StrategyResult<T> = Result<T, StrategyError>;
