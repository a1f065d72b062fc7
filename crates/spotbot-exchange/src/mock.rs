//! In-memory exchange for tests.
//!
//! Scripted responses plus a call log, in the spirit of a recording test
//! double: tests set prices, candles and failures, then assert on
//! `calls()`.

use crate::client::{BoxFuture, ExchangeClient};
use crate::error::{ExchangeError, ExchangeResult};
use crate::types::{
    AccountInfo, ExchangeInfo, Kline, OrderAck, OrderRequest, SymbolFilter, SymbolInfo,
};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use spotbot_core::{OrderStatus, Price, Size};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    GetExchangeInfo,
    GetKlines { symbol: String, interval: String, limit: u16 },
    GetSymbolPrice(String),
    CreateOrder(OrderRequest),
    CancelOrder { symbol: String, order_id: u64 },
    GetOrderStatus { symbol: String, order_id: u64 },
    GetAccountInfo,
    GetListenKey,
    KeepAlive(String),
}

/// Scriptable in-memory exchange.
pub struct MockExchange {
    calls: Mutex<Vec<MockCall>>,
    exchange_info: Mutex<Option<ExchangeInfo>>,
    price: Mutex<Option<Price>>,
    klines: Mutex<Option<Vec<Kline>>>,
    order_failures: Mutex<VecDeque<ExchangeError>>,
    cancel_failures: Mutex<HashSet<u64>>,
    next_order_id: AtomicU64,
    listen_key_seq: AtomicU64,
    listen_key_fails: AtomicBool,
    keep_alive_ok: AtomicBool,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exchange_info: Mutex::new(None),
            price: Mutex::new(None),
            klines: Mutex::new(None),
            order_failures: Mutex::new(VecDeque::new()),
            cancel_failures: Mutex::new(HashSet::new()),
            next_order_id: AtomicU64::new(1),
            listen_key_seq: AtomicU64::new(0),
            listen_key_fails: AtomicBool::new(false),
            keep_alive_ok: AtomicBool::new(true),
        }
    }

    /// Exchange info listing `symbol` with the given lot and price filters.
    pub fn with_symbol(self, symbol: &str, min_qty: Size, max_qty: Size, step: Size, tick: Price) -> Self {
        *self.exchange_info.lock() = Some(ExchangeInfo {
            symbols: vec![SymbolInfo {
                symbol: symbol.to_string(),
                filters: vec![
                    SymbolFilter::PriceFilter {
                        min_price: None,
                        max_price: None,
                        tick_size: tick,
                    },
                    SymbolFilter::LotSize {
                        min_qty,
                        max_qty,
                        step_size: step,
                    },
                ],
            }],
        });
        self
    }

    pub fn set_exchange_info(&self, info: ExchangeInfo) {
        *self.exchange_info.lock() = Some(info);
    }

    pub fn set_price(&self, price: Price) {
        *self.price.lock() = Some(price);
    }

    /// Hourly candles whose closes are `closes`, oldest first.
    pub fn set_closes(&self, closes: &[Price]) {
        let start = Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap_or_else(Utc::now);
        let klines = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Kline {
                open_time: start + ChronoDuration::hours(i as i64),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: Size::ZERO,
            })
            .collect();
        *self.klines.lock() = Some(klines);
    }

    /// Make the next `create_order` fail with `error`.
    pub fn fail_next_order(&self, error: ExchangeError) {
        self.order_failures.lock().push_back(error);
    }

    /// Make every cancel of `order_id` fail.
    pub fn fail_cancel(&self, order_id: u64) {
        self.cancel_failures.lock().insert(order_id);
    }

    pub fn set_listen_key_fails(&self, fails: bool) {
        self.listen_key_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_keep_alive_ok(&self, ok: bool) {
        self.keep_alive_ok.store(ok, Ordering::SeqCst);
    }

    /// Number of listen keys issued so far.
    pub fn listen_keys_issued(&self) -> u64 {
        self.listen_key_seq.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Order requests placed, in order.
    pub fn created_orders(&self) -> Vec<OrderRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                MockCall::CreateOrder(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }

    fn not_configured(what: &str) -> ExchangeError {
        ExchangeError::Transport(format!("mock {what} not configured"))
    }
}

impl ExchangeClient for MockExchange {
    fn get_exchange_info(&self) -> BoxFuture<'_, ExchangeResult<ExchangeInfo>> {
        Box::pin(async move {
            self.record(MockCall::GetExchangeInfo);
            self.exchange_info
                .lock()
                .clone()
                .ok_or_else(|| Self::not_configured("exchange info"))
        })
    }

    fn get_klines<'a>(
        &'a self,
        symbol: &'a str,
        interval: &'a str,
        limit: u16,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Kline>>> {
        Box::pin(async move {
            self.record(MockCall::GetKlines {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
                limit,
            });
            let klines = self
                .klines
                .lock()
                .clone()
                .ok_or_else(|| Self::not_configured("klines"))?;
            let skip = klines.len().saturating_sub(usize::from(limit));
            Ok(klines.into_iter().skip(skip).collect())
        })
    }

    fn get_symbol_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<Price>> {
        Box::pin(async move {
            self.record(MockCall::GetSymbolPrice(symbol.to_string()));
            self.price.lock().ok_or_else(|| Self::not_configured("price"))
        })
    }

    fn create_order(&self, request: OrderRequest) -> BoxFuture<'_, ExchangeResult<OrderAck>> {
        Box::pin(async move {
            self.record(MockCall::CreateOrder(request.clone()));
            if let Some(error) = self.order_failures.lock().pop_front() {
                return Err(error);
            }
            let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
            Ok(OrderAck {
                symbol: request.symbol,
                order_id,
                client_order_id: Some(request.client_order_id.to_string()),
                status: OrderStatus::New,
                side: Some(request.side),
                order_type: Some(request.order_type),
                orig_qty: request.quantity,
                executed_qty: Some(Size::ZERO),
                price: request.price,
            })
        })
    }

    fn cancel_order<'a>(
        &'a self,
        symbol: &'a str,
        order_id: u64,
    ) -> BoxFuture<'a, ExchangeResult<OrderAck>> {
        Box::pin(async move {
            self.record(MockCall::CancelOrder {
                symbol: symbol.to_string(),
                order_id,
            });
            if self.cancel_failures.lock().contains(&order_id) {
                return Err(ExchangeError::from_response(
                    400,
                    r#"{"code":-2011,"msg":"Unknown order sent."}"#,
                ));
            }
            Ok(mock_ack(symbol, order_id, OrderStatus::Canceled))
        })
    }

    fn get_order_status<'a>(
        &'a self,
        symbol: &'a str,
        order_id: u64,
    ) -> BoxFuture<'a, ExchangeResult<OrderAck>> {
        Box::pin(async move {
            self.record(MockCall::GetOrderStatus {
                symbol: symbol.to_string(),
                order_id,
            });
            Ok(mock_ack(symbol, order_id, OrderStatus::Filled))
        })
    }

    fn get_account_info(&self) -> BoxFuture<'_, ExchangeResult<AccountInfo>> {
        Box::pin(async move {
            self.record(MockCall::GetAccountInfo);
            Ok(AccountInfo {
                can_trade: true,
                balances: Vec::new(),
            })
        })
    }

    fn get_listen_key(&self) -> BoxFuture<'_, ExchangeResult<String>> {
        Box::pin(async move {
            self.record(MockCall::GetListenKey);
            if self.listen_key_fails.load(Ordering::SeqCst) {
                return Err(ExchangeError::Transport("listen key unavailable".to_string()));
            }
            let n = self.listen_key_seq.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("listen-key-{n}"))
        })
    }

    fn keep_alive_listen_key<'a>(&'a self, listen_key: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.record(MockCall::KeepAlive(listen_key.to_string()));
            self.keep_alive_ok.load(Ordering::SeqCst)
        })
    }
}

fn mock_ack(symbol: &str, order_id: u64, status: OrderStatus) -> OrderAck {
    OrderAck {
        symbol: symbol.to_string(),
        order_id,
        client_order_id: None,
        status,
        side: None,
        order_type: None,
        orig_qty: None,
        executed_qty: None,
        price: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use spotbot_core::OrderSide;

    #[tokio::test]
    async fn test_orders_get_sequential_ids() {
        let mock = MockExchange::new();
        let request = OrderRequest::market("BTCUSDT", OrderSide::Buy, Size::new(dec!(0.001)));

        let first = mock.create_order(request.clone()).await.unwrap();
        let second = mock.create_order(request).await.unwrap();
        assert_eq!(first.order_id, 1);
        assert_eq!(second.order_id, 2);
        assert_eq!(mock.created_orders().len(), 2);
    }

    #[tokio::test]
    async fn test_klines_respect_limit() {
        let mock = MockExchange::new();
        let closes: Vec<Price> = (1..=5).map(|i| Price::new(rust_decimal::Decimal::from(i))).collect();
        mock.set_closes(&closes);

        let klines = mock.get_klines("BTCUSDT", "1h", 3).await.unwrap();
        assert_eq!(klines.len(), 3);
        assert_eq!(klines[2].close, Price::new(dec!(5)));
    }

    #[tokio::test]
    async fn test_exchange_info_rules() {
        let mock = MockExchange::new().with_symbol(
            "BTCUSDT",
            Size::new(dec!(0.0001)),
            Size::new(dec!(100)),
            Size::new(dec!(0.0001)),
            Price::new(dec!(0.01)),
        );
        let info = mock.get_exchange_info().await.unwrap();
        assert!(info.trading_rules("BTCUSDT").is_ok());
    }

    #[tokio::test]
    async fn test_listen_keys_are_distinct() {
        let mock = MockExchange::new();
        let a = mock.get_listen_key().await.unwrap();
        let b = mock.get_listen_key().await.unwrap();
        assert_ne!(a, b);
        assert_eq!(mock.listen_keys_issued(), 2);
    }
}
