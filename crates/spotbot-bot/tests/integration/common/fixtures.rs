//! Shared test fixtures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use spotbot_core::{Price, Size};
use spotbot_exchange::MockExchange;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const SYMBOL: &str = "BTCUSDT";

/// Closes that produce a BUY with default strategy settings: RSI 25 on the
/// first 14 changes, last close well above the 20-period average.
pub fn oversold_uptrend() -> Vec<Price> {
    let mut values: Vec<i64> = vec![100];
    for _ in 0..7 {
        values.push(values[values.len() - 1] - 3);
    }
    for _ in 0..7 {
        values.push(values[values.len() - 1] + 1);
    }
    for _ in 0..10 {
        values.push(values[values.len() - 1] + 2);
    }
    values.into_iter().map(|v| Price::new(Decimal::from(v))).collect()
}

/// Exchange that lists `SYMBOL` and quotes the last fixture close.
pub fn mock_exchange() -> Arc<MockExchange> {
    let mock = MockExchange::new().with_symbol(
        SYMBOL,
        Size::new(dec!(0.00001)),
        Size::new(dec!(9000)),
        Size::new(dec!(0.00001)),
        Price::new(dec!(0.01)),
    );
    let closes = oversold_uptrend();
    mock.set_price(closes[closes.len() - 1]);
    mock.set_closes(&closes);
    Arc::new(mock)
}

/// Execution report frame for `order_id`.
pub fn execution_report(order_id: u64, status: &str) -> String {
    serde_json::json!({
        "e": "executionReport",
        "E": 1_700_000_000_000u64,
        "s": SYMBOL,
        "c": "spot_0123456789abcdef01234567",
        "S": "BUY",
        "o": "MARKET",
        "x": "TRADE",
        "X": status,
        "i": order_id,
        "z": "0.001",
        "L": "106.00"
    })
    .to_string()
}

/// Poll `condition` every 10ms until it holds or `limit` passes.
pub async fn wait_until<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(limit, async {
        loop {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
