//! User data stream error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connect timed out after {0}ms")]
    ConnectTimeout(u64),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Listen key request failed: {0}")]
    ListenKey(#[from] spotbot_exchange::ExchangeError),

    #[error("Listen key renewal failed")]
    ListenKeyRenewalFailed,

    #[error("Listen key expired")]
    ListenKeyExpired,

    #[error("Stream already started")]
    AlreadyStarted,

    #[error("Stream session closed")]
    SessionClosed,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// Short label for reconnect metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::ConnectionClosed { .. } => "server_close",
            Self::ListenKey(_) => "listen_key",
            Self::ListenKeyRenewalFailed => "renewal_failed",
            Self::ListenKeyExpired => "listen_key_expired",
            Self::AlreadyStarted | Self::SessionClosed => "lifecycle",
            Self::Tungstenite(_) => "socket_error",
            Self::Json(_) => "decode",
        }
    }
}

pub type WsResult<T> = Result<T, WsError>;
