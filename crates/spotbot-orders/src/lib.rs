//! Order lifecycle management for the spot trading bot.
//!
//! Turns signals into market orders and tracks what they leave behind:
//! - Quantities normalized to the symbol's lot step, checked against its bounds
//! - Active orders keyed by exchange order id until a terminal report arrives
//! - Position and daily trade count, shared with the stream and control loop
//!   under one lock

pub mod error;
pub mod manager;

pub use error::{OrderError, OrderResult};
pub use manager::{ActiveOrder, OrderManager, OrderManagerConfig, PositionInfo};
