//! Application configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spotbot_core::Size;
use spotbot_exchange::{Credentials, RestConfig, RetryPolicy};
use spotbot_orders::OrderManagerConfig;
use spotbot_strategy::StrategyConfig;
use spotbot_ws::StreamConfig;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "SPOTBOT_CONFIG";
pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const SECRET_KEY_ENV: &str = "BINANCE_SECRET_KEY";

const TESTNET_REST_URL: &str = "https://testnet.binance.vision/api";
const TESTNET_WS_URL: &str = "wss://testnet.binance.vision/ws";
const LIVE_REST_URL: &str = "https://api.binance.us/api";
const LIVE_WS_URL: &str = "wss://stream.binance.us:9443/ws";

/// Order sizing and control loop cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Base-asset quantity per order.
    #[serde(default = "default_order_size")]
    pub order_size: Decimal,
    /// Seconds between strategy cycles.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Sleep between cadence checks (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_order_size() -> Decimal {
    Decimal::new(1, 3) // 0.001
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            order_size: default_order_size(),
            check_interval_secs: default_check_interval_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// REST transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_recv_window_ms() -> u64 {
    5000
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            timeout_ms: default_timeout_ms(),
            recv_window_ms: default_recv_window_ms(),
        }
    }
}

/// User data stream settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Bound on joining stream tasks at shutdown.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    300_000
}

fn default_keepalive_interval_secs() -> u64 {
    1800
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Use the exchange testnet.
    #[serde(default = "default_testnet")]
    pub testnet: bool,
    /// Overrides the environment's REST base URL.
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Overrides the environment's WebSocket base URL.
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub rest: RestSettings,
    #[serde(default)]
    pub stream: StreamSettings,
}

fn default_testnet() -> bool {
    true
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            testnet: default_testnet(),
            rest_url: None,
            ws_url: None,
            symbol: default_symbol(),
            log_level: default_log_level(),
            trading: TradingConfig::default(),
            strategy: StrategyConfig::default(),
            rest: RestSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from `explicit` if given, else `SPOTBOT_CONFIG`, else the
    /// default path. Only a missing file at the default path falls back to
    /// defaults.
    pub fn load(explicit: Option<&str>) -> AppResult<Self> {
        let chosen = explicit
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok());

        match chosen {
            Some(path) => Self::from_file(&path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(AppError::Config("symbol must not be empty".to_string()));
        }
        self.strategy.validate().map_err(AppError::Config)?;
        if self.trading.order_size <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "trading.order_size must be positive, got {}",
                self.trading.order_size
            )));
        }
        if self.trading.check_interval_secs == 0 || self.trading.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "trading.check_interval_secs and trading.poll_interval_ms must be positive"
                    .to_string(),
            ));
        }
        if self.rest.max_attempts == 0 {
            return Err(AppError::Config("rest.max_attempts must be at least 1".to_string()));
        }
        if self.stream.reconnect_base_delay_ms == 0
            || self.stream.reconnect_base_delay_ms > self.stream.reconnect_max_delay_ms
        {
            return Err(AppError::Config(format!(
                "stream.reconnect_base_delay_ms ({}) must be positive and at most reconnect_max_delay_ms ({})",
                self.stream.reconnect_base_delay_ms, self.stream.reconnect_max_delay_ms
            )));
        }
        if self.stream.keepalive_interval_secs == 0 {
            return Err(AppError::Config(
                "stream.keepalive_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rest_url(&self) -> &str {
        match (&self.rest_url, self.testnet) {
            (Some(url), _) => url,
            (None, true) => TESTNET_REST_URL,
            (None, false) => LIVE_REST_URL,
        }
    }

    pub fn ws_url(&self) -> &str {
        match (&self.ws_url, self.testnet) {
            (Some(url), _) => url,
            (None, true) => TESTNET_WS_URL,
            (None, false) => LIVE_WS_URL,
        }
    }

    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.rest_url().to_string(),
            retry: RetryPolicy::new(
                self.rest.max_attempts,
                Duration::from_millis(self.rest.retry_base_delay_ms),
            ),
            request_timeout: Duration::from_millis(self.rest.timeout_ms),
            recv_window_ms: self.rest.recv_window_ms,
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            url: self.ws_url().to_string(),
            reconnect_base_delay_ms: self.stream.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.stream.reconnect_max_delay_ms,
            keepalive_interval_ms: self.stream.keepalive_interval_secs.saturating_mul(1000),
            connect_timeout_ms: self.stream.connect_timeout_ms,
        }
    }

    pub fn order_manager_config(&self) -> OrderManagerConfig {
        OrderManagerConfig {
            symbol: self.symbol.clone(),
            order_size: Size::new(self.trading.order_size),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.trading.check_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.trading.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.stream.shutdown_timeout_ms)
    }
}

/// Read API credentials from the environment.
pub fn credentials_from_env() -> AppResult<Credentials> {
    let api_key = non_empty_env(API_KEY_ENV)?;
    let secret = non_empty_env(SECRET_KEY_ENV)?;
    Ok(Credentials::new(api_key, secret))
}

fn non_empty_env(name: &str) -> AppResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(AppError::MissingCredential(name.to_string())),
    }
}
