//! User data stream client for the spot trading bot.
//!
//! Keeps one authenticated WebSocket alive for the account:
//! - Listen key issued on first connect, reused across reconnects
//! - Keepalive renewal on its own timer; a failed renewal forces a reconnect
//! - Exponential reconnect backoff (1s doubling, capped), retried indefinitely
//! - Typed events dispatched to registered subscribers

pub mod backoff;
pub mod connection;
pub mod error;
pub mod event;
pub mod keepalive;

pub use backoff::ReconnectBackoff;
pub use connection::{ConnectionState, StreamConfig, UserDataStream};
pub use error::{WsError, WsResult};
pub use event::{
    decode_event, AccountBalance, AccountPosition, BalanceUpdate, ChannelSubscriber,
    ExecutionReport, UserDataEvent, UserDataHandler,
};
pub use keepalive::ListenKeyKeeper;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any TLS connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
