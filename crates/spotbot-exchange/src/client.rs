//! Exchange client trait.
//!
//! Dyn-compatible so the signal engine, order manager and user data stream
//! can share one `Arc<dyn ExchangeClient>` and tests can substitute
//! `MockExchange`.

use crate::error::ExchangeResult;
use crate::types::{AccountInfo, ExchangeInfo, Kline, OrderAck, OrderRequest};
use spotbot_core::Price;
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// REST surface the bot consumes.
///
/// Implementations own their retry policy: a returned error has already
/// exhausted retries (or was not retryable).
pub trait ExchangeClient: Send + Sync {
    /// Symbol metadata with lot and price filters.
    fn get_exchange_info(&self) -> BoxFuture<'_, ExchangeResult<ExchangeInfo>>;

    /// Candles oldest first.
    fn get_klines<'a>(
        &'a self,
        symbol: &'a str,
        interval: &'a str,
        limit: u16,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Kline>>>;

    /// Latest trade price.
    fn get_symbol_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<Price>>;

    /// Place an order (signed).
    fn create_order(&self, request: OrderRequest) -> BoxFuture<'_, ExchangeResult<OrderAck>>;

    /// Cancel an order (signed).
    fn cancel_order<'a>(
        &'a self,
        symbol: &'a str,
        order_id: u64,
    ) -> BoxFuture<'a, ExchangeResult<OrderAck>>;

    /// Query an order (signed).
    fn get_order_status<'a>(
        &'a self,
        symbol: &'a str,
        order_id: u64,
    ) -> BoxFuture<'a, ExchangeResult<OrderAck>>;

    /// Account balances (signed).
    fn get_account_info(&self) -> BoxFuture<'_, ExchangeResult<AccountInfo>>;

    /// Open a user data stream and return its listen key.
    fn get_listen_key(&self) -> BoxFuture<'_, ExchangeResult<String>>;

    /// Extend a listen key's validity. Never fails; `false` means the
    /// renewal did not succeed.
    fn keep_alive_listen_key<'a>(&'a self, listen_key: &'a str) -> BoxFuture<'a, bool>;
}
