//! REST wire types.

use crate::error::{ExchangeError, ExchangeResult};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use spotbot_core::{
    ClientOrderId, OrderSide, OrderStatus, OrderType, Price, PricePoint, PriceSeries, Size,
    SymbolTradingRules,
};

/// `GET /v3/exchangeInfo` response (only the parts the bot reads).
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// Symbol filter, discriminated by `filterType`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        min_qty: Size,
        max_qty: Size,
        step_size: Size,
    },
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter {
        #[serde(default)]
        min_price: Option<Price>,
        #[serde(default)]
        max_price: Option<Price>,
        tick_size: Price,
    },
    #[serde(other)]
    Other,
}

impl ExchangeInfo {
    /// Extract the lot and price filters for `symbol`.
    ///
    /// A missing symbol or filter is a startup configuration error.
    pub fn trading_rules(&self, symbol: &str) -> ExchangeResult<SymbolTradingRules> {
        let info = self
            .symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;

        let lot = info.filters.iter().find_map(|f| match f {
            SymbolFilter::LotSize {
                min_qty,
                max_qty,
                step_size,
            } => Some((*min_qty, *max_qty, *step_size)),
            _ => None,
        });
        let (min_qty, max_qty, step_size) = lot.ok_or_else(|| ExchangeError::MissingFilter {
            symbol: symbol.to_string(),
            filter: "LOT_SIZE",
        })?;

        let tick_size = info
            .filters
            .iter()
            .find_map(|f| match f {
                SymbolFilter::PriceFilter { tick_size, .. } => Some(*tick_size),
                _ => None,
            })
            .ok_or_else(|| ExchangeError::MissingFilter {
                symbol: symbol.to_string(),
                filter: "PRICE_FILTER",
            })?;

        Ok(SymbolTradingRules::new(
            symbol, min_qty, max_qty, step_size, tick_size,
        )?)
    }
}

/// One candle. The exchange encodes candles as heterogeneous arrays:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kline {
    pub open_time: DateTime<Utc>,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Size,
}

impl Kline {
    pub fn from_row(row: &[serde_json::Value]) -> ExchangeResult<Self> {
        let open_time_ms = row
            .first()
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| ExchangeError::Decode("kline open time missing".to_string()))?;
        let open_time = Utc
            .timestamp_millis_opt(open_time_ms)
            .single()
            .ok_or_else(|| ExchangeError::Decode(format!("kline open time {open_time_ms}")))?;

        Ok(Self {
            open_time,
            open: decimal_field(row, 1)?.into(),
            high: decimal_field(row, 2)?.into(),
            low: decimal_field(row, 3)?.into(),
            close: decimal_field(row, 4)?.into(),
            volume: decimal_field(row, 5)?.into(),
        })
    }

    /// Closing prices as a series keyed by candle open time.
    pub fn to_price_series(klines: &[Kline]) -> PriceSeries {
        PriceSeries::new(
            klines
                .iter()
                .map(|k| PricePoint {
                    timestamp: k.open_time,
                    close: k.close,
                })
                .collect(),
        )
    }
}

fn decimal_field(row: &[serde_json::Value], index: usize) -> ExchangeResult<rust_decimal::Decimal> {
    let raw = row
        .get(index)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ExchangeError::Decode(format!("kline field {index} missing")))?;
    raw.parse()
        .map_err(|e| ExchangeError::Decode(format!("kline field {index} ({raw}): {e}")))
}

/// `GET /v3/ticker/price` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: Price,
}

/// Order placement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Option<Size>,
    pub price: Option<Price>,
    pub client_order_id: ClientOrderId,
}

impl OrderRequest {
    /// Market order for an already-normalized quantity.
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Size) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity: Some(quantity),
            price: None,
            client_order_id: ClientOrderId::new(),
        }
    }

    /// Query parameters in the order the exchange documents them.
    ///
    /// `price` is only sent for order types that take one.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", self.symbol.clone()),
            ("side", self.side.as_str().to_string()),
            ("type", self.order_type.as_str().to_string()),
        ];
        if self.order_type.requires_price() {
            params.push(("timeInForce", "GTC".to_string()));
        }
        if let Some(quantity) = self.quantity {
            params.push(("quantity", quantity.to_string()));
        }
        if self.order_type.requires_price() {
            if let Some(price) = self.price {
                params.push(("price", price.to_string()));
            }
        }
        params.push(("newClientOrderId", self.client_order_id.to_string()));
        params
    }
}

/// Order response shared by place, cancel and status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub symbol: String,
    pub order_id: u64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub side: Option<OrderSide>,
    #[serde(default, rename = "type")]
    pub order_type: Option<OrderType>,
    #[serde(default)]
    pub orig_qty: Option<Size>,
    #[serde(default)]
    pub executed_qty: Option<Size>,
    #[serde(default)]
    pub price: Option<Price>,
}

/// `GET /v3/account` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub can_trade: bool,
    #[serde(default)]
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Size,
    pub locked: Size,
}

impl AccountInfo {
    pub fn balance(&self, asset: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.asset == asset)
    }

    /// Balances with a non-zero free or locked amount.
    pub fn non_zero_balances(&self) -> impl Iterator<Item = &Balance> {
        self.balances
            .iter()
            .filter(|b| !b.free.is_zero() || !b.locked.is_zero())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListenKeyResponse {
    pub listen_key: String,
}
