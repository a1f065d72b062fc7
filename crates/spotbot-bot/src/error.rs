//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] spotbot_exchange::ExchangeError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] spotbot_strategy::StrategyError),

    #[error("Order manager error: {0}")]
    Orders(#[from] spotbot_orders::OrderError),

    #[error("Stream error: {0}")]
    Stream(#[from] spotbot_ws::WsError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] spotbot_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
