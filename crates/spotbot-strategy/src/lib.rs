//! Signal engine for the spot trading bot.
//!
//! Turns a window of closing prices plus the current position into a
//! BUY/SELL/HOLD decision:
//! - RSI over the first `period` price changes of the window
//! - Simple moving average over the last `period` closes
//! - Stop-loss / take-profit checks that override the indicators

pub mod config;
pub mod engine;
pub mod error;
pub mod indicators;

pub use config::StrategyConfig;
pub use engine::{Evaluation, PositionContext, Reason, SignalEngine};
pub use error::{StrategyError, StrategyResult};
pub use indicators::{calculate_rsi, calculate_sma};
