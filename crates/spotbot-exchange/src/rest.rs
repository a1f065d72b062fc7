//! Signed REST client.

use crate::client::{BoxFuture, ExchangeClient};
use crate::error::{ExchangeError, ExchangeResult};
use crate::retry::RetryPolicy;
use crate::signing::{encode_query, sign_query, Credentials, API_KEY_HEADER};
use crate::types::{
    AccountInfo, ExchangeInfo, Kline, ListenKeyResponse, OrderAck, OrderRequest, TickerPrice,
};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use spotbot_core::Price;
use std::time::Duration;
use tracing::{debug, info, warn};

/// REST client configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// API base including the `/api` prefix, e.g. `https://testnet.binance.vision/api`.
    pub base_url: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub recv_window_ms: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://testnet.binance.vision/api".to_string(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            recv_window_ms: 5000,
        }
    }
}

/// How a request authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Security {
    /// Public market data.
    None,
    /// API key header only (user data stream endpoints).
    ApiKey,
    /// API key header plus HMAC signature.
    Signed,
}

/// Exchange REST client.
pub struct RestClient {
    http: Client,
    config: RestConfig,
    credentials: Credentials,
}

impl RestClient {
    pub fn new(config: RestConfig, credentials: Credentials) -> ExchangeResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        info!(base_url = %config.base_url, "REST client created");

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Vec<(&'static str, String)>,
        security: Security,
    ) -> ExchangeResult<T> {
        let label = format!("{method} {path}");
        self.config
            .retry
            .run(&label, || self.send_once(method.clone(), path, &params, security))
            .await
    }

    /// One attempt. Signed requests get a fresh timestamp and signature each time.
    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        security: Security,
    ) -> ExchangeResult<T> {
        let mut query = encode_query(params);
        if security == Security::Signed {
            let timestamp = chrono::Utc::now().timestamp_millis();
            query = sign_query(&self.credentials, &query, timestamp, self.config.recv_window_ms)?;
        }

        let url = if query.is_empty() {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}{}?{}", self.config.base_url, path, query)
        };

        let mut request = self.http.request(method, url);
        if security != Security::None {
            request = request.header(API_KEY_HEADER, self.credentials.api_key());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::from_response(status.as_u16(), &body));
        }

        debug!(path, status = status.as_u16(), "REST response");
        serde_json::from_str(&body).map_err(|e| ExchangeError::Decode(format!("{path}: {e}")))
    }
}

impl ExchangeClient for RestClient {
    fn get_exchange_info(&self) -> BoxFuture<'_, ExchangeResult<ExchangeInfo>> {
        Box::pin(async move {
            self.request(Method::GET, "/v3/exchangeInfo", Vec::new(), Security::None)
                .await
        })
    }

    fn get_klines<'a>(
        &'a self,
        symbol: &'a str,
        interval: &'a str,
        limit: u16,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Kline>>> {
        Box::pin(async move {
            let params = vec![
                ("symbol", symbol.to_string()),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ];
            let rows: Vec<Vec<serde_json::Value>> = self
                .request(Method::GET, "/v3/klines", params, Security::None)
                .await?;
            rows.iter().map(|row| Kline::from_row(row)).collect()
        })
    }

    fn get_symbol_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<Price>> {
        Box::pin(async move {
            let ticker: TickerPrice = self
                .request(
                    Method::GET,
                    "/v3/ticker/price",
                    vec![("symbol", symbol.to_string())],
                    Security::None,
                )
                .await?;
            Ok(ticker.price)
        })
    }

    fn create_order(&self, request: OrderRequest) -> BoxFuture<'_, ExchangeResult<OrderAck>> {
        Box::pin(async move {
            let ack: OrderAck = self
                .request(Method::POST, "/v3/order", request.to_params(), Security::Signed)
                .await?;
            info!(
                symbol = %ack.symbol,
                order_id = ack.order_id,
                side = %request.side,
                status = %ack.status,
                "Order created"
            );
            Ok(ack)
        })
    }

    fn cancel_order<'a>(
        &'a self,
        symbol: &'a str,
        order_id: u64,
    ) -> BoxFuture<'a, ExchangeResult<OrderAck>> {
        Box::pin(async move {
            let params = vec![
                ("symbol", symbol.to_string()),
                ("orderId", order_id.to_string()),
            ];
            self.request(Method::DELETE, "/v3/order", params, Security::Signed)
                .await
        })
    }

    fn get_order_status<'a>(
        &'a self,
        symbol: &'a str,
        order_id: u64,
    ) -> BoxFuture<'a, ExchangeResult<OrderAck>> {
        Box::pin(async move {
            let params = vec![
                ("symbol", symbol.to_string()),
                ("orderId", order_id.to_string()),
            ];
            self.request(Method::GET, "/v3/order", params, Security::Signed)
                .await
        })
    }

    fn get_account_info(&self) -> BoxFuture<'_, ExchangeResult<AccountInfo>> {
        Box::pin(async move {
            self.request(Method::GET, "/v3/account", Vec::new(), Security::Signed)
                .await
        })
    }

    fn get_listen_key(&self) -> BoxFuture<'_, ExchangeResult<String>> {
        Box::pin(async move {
            let response: ListenKeyResponse = self
                .request(Method::POST, "/v3/userDataStream", Vec::new(), Security::ApiKey)
                .await?;
            if response.listen_key.trim().is_empty() {
                return Err(ExchangeError::Decode("empty listenKey".to_string()));
            }
            info!("Obtained listen key");
            Ok(response.listen_key)
        })
    }

    fn keep_alive_listen_key<'a>(&'a self, listen_key: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let result: ExchangeResult<serde_json::Value> = self
                .request(
                    Method::PUT,
                    "/v3/userDataStream",
                    vec![("listenKey", listen_key.to_string())],
                    Security::ApiKey,
                )
                .await;
            match result {
                Ok(_) => {
                    debug!("Listen key renewed");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Failed to keep listen key alive");
                    false
                }
            }
        })
    }
}
