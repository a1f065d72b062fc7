//! Exchange client for the spot trading bot.
//!
//! Exposes the `ExchangeClient` trait consumed by the signal engine, the
//! order manager and the user data stream, a signed REST implementation
//! with bounded retry, and an in-memory mock for tests.

pub mod client;
pub mod error;
pub mod mock;
pub mod rest;
pub mod retry;
pub mod signing;
pub mod types;

pub use client::{BoxFuture, ExchangeClient};
pub use error::{ExchangeError, ExchangeResult};
pub use mock::{MockCall, MockExchange};
pub use rest::{RestClient, RestConfig};
pub use retry::RetryPolicy;
pub use signing::Credentials;
pub use types::{
    AccountInfo, Balance, ExchangeInfo, Kline, OrderAck, OrderRequest, SymbolFilter, SymbolInfo,
};
