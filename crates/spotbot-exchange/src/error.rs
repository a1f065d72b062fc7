//! Exchange client error types.

use thiserror::Error;

/// Exchange error codes that mean the credentials or signature were rejected.
const AUTH_ERROR_CODES: [i64; 3] = [-1022, -2014, -2015];

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Connect failures and timeouts.
    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Authentication rejected (HTTP {status}, code {code:?}): {message}")]
    Auth {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Exchange rejected request (HTTP {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Symbol not found in exchange info: {0}")]
    SymbolNotFound(String),

    #[error("Symbol {symbol} has no {filter} filter")]
    MissingFilter {
        symbol: String,
        filter: &'static str,
    },

    #[error("Invalid trading rules: {0}")]
    Rules(#[from] spotbot_core::CoreError),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl ExchangeError {
    /// Build an error from a non-success response body.
    ///
    /// The exchange returns `{"code": -2015, "msg": "..."}` on failure.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(serde_json::Value::as_i64);
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("msg"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| body.to_string(), str::to_string);

        let is_auth = status == 401
            || status == 403
            || code.is_some_and(|c| AUTH_ERROR_CODES.contains(&c));

        if is_auth {
            Self::Auth {
                status,
                code,
                message,
            }
        } else {
            Self::Api {
                status,
                code,
                message,
            }
        }
    }

    /// Timeouts, connect errors, 5xx and rate limiting. Retried by the client.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429 || *status == 418,
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::HttpClient(_) => "transport",
            Self::Auth { .. } => "auth",
            Self::Api { .. } => "rejected",
            Self::Signing(_) => "signing",
            Self::Decode(_) => "decode",
            Self::SymbolNotFound(_) | Self::MissingFilter { .. } | Self::Rules(_) => "rules",
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            Self::Transport(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::HttpClient(e.to_string())
        }
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
