//! Core domain types for the spot trading bot.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`, `Size`: precision-safe numeric types with step/tick normalization
//! - `SymbolTradingRules`: exchange-imposed quantity and price granularity
//! - `OrderSide`, `OrderType`, `OrderStatus`: order enums
//! - `Signal`: strategy decision
//! - `Position`, `TradeCounter`: per-symbol trading state

pub mod decimal;
pub mod error;
pub mod market;
pub mod order;
pub mod position;
pub mod signal;
pub mod types;

pub use decimal::{normalize_to_increment, Price, Size};
pub use error::{CoreError, Result};
pub use market::SymbolTradingRules;
pub use order::{ClientOrderId, OrderSide, OrderStatus, OrderType};
pub use position::{Position, TradeCounter};
pub use signal::Signal;
pub use types::{PricePoint, PriceSeries};
