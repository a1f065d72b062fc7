//! Prometheus metrics and structured logging for the spot trading bot.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Prometheus collectors for signals, orders and the user data stream

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
