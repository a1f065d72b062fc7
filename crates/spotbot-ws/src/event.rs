//! User data stream events.
//!
//! Payloads are JSON objects discriminated by the `e` field. Field names
//! are the exchange's single-letter keys; note that `s`/`S` and `x`/`X`
//! are distinct fields.

use crate::error::WsResult;
use rust_decimal::Decimal;
use serde::Deserialize;
use spotbot_core::{OrderSide, OrderStatus, Price, Size};
use tokio::sync::mpsc;

/// Decoded user data event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "e")]
pub enum UserDataEvent {
    #[serde(rename = "executionReport")]
    ExecutionReport(ExecutionReport),
    #[serde(rename = "outboundAccountPosition")]
    AccountPosition(AccountPosition),
    #[serde(rename = "balanceUpdate")]
    BalanceUpdate(BalanceUpdate),
    #[serde(rename = "listenKeyExpired")]
    ListenKeyExpired,
    /// Any other discriminator. Ignored.
    #[serde(other)]
    Unknown,
}

impl UserDataEvent {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExecutionReport(_) => "execution_report",
            Self::AccountPosition(_) => "account_position",
            Self::BalanceUpdate(_) => "balance_update",
            Self::ListenKeyExpired => "listen_key_expired",
            Self::Unknown => "unknown",
        }
    }
}

/// Order status transition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutionReport {
    #[serde(rename = "E", default)]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c", default)]
    pub client_order_id: String,
    #[serde(rename = "S", default)]
    pub side: Option<OrderSide>,
    /// Kept as text: the stream reports types the bot never places.
    #[serde(rename = "o", default)]
    pub order_type: Option<String>,
    #[serde(rename = "x", default)]
    pub execution_type: Option<String>,
    #[serde(rename = "X")]
    pub status: OrderStatus,
    #[serde(rename = "i")]
    pub order_id: u64,
    #[serde(rename = "z", default)]
    pub cumulative_filled_qty: Option<Size>,
    #[serde(rename = "L", default)]
    pub last_price: Option<Price>,
}

/// Balances changed by an account update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountPosition {
    #[serde(rename = "E", default)]
    pub event_time: u64,
    #[serde(rename = "B", default)]
    pub balances: Vec<AccountBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "f")]
    pub free: Size,
    #[serde(rename = "l")]
    pub locked: Size,
}

/// Deposit, withdrawal or transfer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BalanceUpdate {
    #[serde(rename = "E", default)]
    pub event_time: u64,
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "d")]
    pub delta: Decimal,
}

/// Decode one text frame.
pub fn decode_event(text: &str) -> WsResult<UserDataEvent> {
    Ok(serde_json::from_str(text)?)
}

/// Subscriber to user data events.
///
/// Delivery is at-least-once and runs on the stream's connection task, so
/// implementations must be idempotent and must not block.
pub trait UserDataHandler: Send + Sync {
    fn on_event(&self, event: &UserDataEvent);
}

/// Forwards events onto an unbounded channel.
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<UserDataEvent>,
}

impl ChannelSubscriber {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UserDataEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UserDataHandler for ChannelSubscriber {
    fn on_event(&self, event: &UserDataEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}
