//! Main application orchestration.
//!
//! Coordinates all components:
//! - Exchange REST client shared by every component
//! - Signal engine run on the configured cadence
//! - Order manager, subscribed to the user data stream
//! - Shutdown: stop the loop, close the stream, cancel what is still open

use crate::config::AppConfig;
use crate::error::AppResult;
use chrono::Utc;
use spotbot_exchange::{Credentials, ExchangeClient, OrderAck, RestClient};
use spotbot_orders::OrderManager;
use spotbot_strategy::SignalEngine;
use spotbot_telemetry::Metrics;
use spotbot_ws::UserDataStream;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Requests a graceful stop of a running [`Application`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    client: Arc<dyn ExchangeClient>,
    engine: SignalEngine,
    orders: Arc<OrderManager>,
    stream: Arc<UserDataStream>,
    shutdown_token: CancellationToken,
}

impl Application {
    /// Build against the live REST API.
    pub async fn new(config: AppConfig, credentials: Credentials) -> AppResult<Self> {
        let client: Arc<dyn ExchangeClient> =
            Arc::new(RestClient::new(config.rest_config(), credentials)?);
        Self::with_client(config, client).await
    }

    /// Build against any exchange client.
    ///
    /// Loads the symbol's trading rules; failing to do so is fatal.
    pub async fn with_client(config: AppConfig, client: Arc<dyn ExchangeClient>) -> AppResult<Self> {
        config.validate()?;

        let engine = SignalEngine::new(
            config.symbol.clone(),
            config.strategy.clone(),
            Arc::clone(&client),
        )?;
        let orders = Arc::new(
            OrderManager::new(config.order_manager_config(), Arc::clone(&client)).await?,
        );
        let stream = Arc::new(UserDataStream::new(config.stream_config(), Arc::clone(&client)));
        stream.subscribe(orders.clone());

        Ok(Self {
            config,
            client,
            engine,
            orders,
            stream,
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown_token.clone(),
        }
    }

    pub fn orders(&self) -> &Arc<OrderManager> {
        &self.orders
    }

    pub fn stream(&self) -> &Arc<UserDataStream> {
        &self.stream
    }

    pub fn engine(&self) -> &SignalEngine {
        &self.engine
    }

    /// Run until shutdown is requested, then shut down the components.
    ///
    /// A cycle already in progress finishes before shutdown begins.
    pub async fn run(self) -> AppResult<()> {
        info!(
            symbol = %self.config.symbol,
            testnet = self.config.testnet,
            check_interval_secs = self.config.trading.check_interval_secs,
            "Starting application"
        );

        self.log_account_summary().await;
        self.stream.start()?;

        let check_interval = self.config.check_interval();
        let poll_interval = self.config.poll_interval();
        let mut last_cycle: Option<Instant> = None;

        info!("Entering control loop");
        loop {
            if last_cycle.map_or(true, |t| t.elapsed() >= check_interval) {
                last_cycle = Some(Instant::now());
                self.run_cycle().await;
            }

            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                () = tokio::time::sleep(poll_interval) => {}
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// One strategy cycle: evaluate, act, report.
    pub async fn run_cycle(&self) -> Option<OrderAck> {
        let context = self.orders.signal_context(Utc::now().date_naive());
        let signal = self.engine.generate_signal(&context).await;
        let ack = self.orders.execute(signal).await;
        self.log_status();
        ack
    }

    fn log_status(&self) {
        let position = self.orders.position_info();
        info!(
            in_position = position.in_position,
            entry_price = ?position.entry_price.map(|p| p.to_string()),
            trades_today = position.trades_today,
            active_orders = position.active_orders,
            last_signal = ?self.engine.last_signal().map(|s| s.as_str()),
            stream = %self.stream.state(),
            "Status"
        );
    }

    async fn log_account_summary(&self) {
        match self.client.get_account_info().await {
            Ok(account) => {
                info!(can_trade = account.can_trade, "Account loaded");
                for balance in account.non_zero_balances() {
                    info!(
                        asset = %balance.asset,
                        free = %balance.free,
                        locked = %balance.locked,
                        "Balance"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Account summary unavailable"),
        }
    }

    async fn shutdown(&self) {
        info!("Shutting down");
        self.stream.disconnect(self.config.shutdown_timeout()).await;

        let open = self.orders.active_order_count();
        if open > 0 {
            let cancelled = self.orders.cancel_all().await;
            if cancelled < open {
                warn!(open, cancelled, "Some orders could not be cancelled");
            } else {
                info!(cancelled, "Active orders cancelled");
            }
        }

        let position = self.orders.position_info();
        info!(
            in_position = position.in_position,
            trades_today = position.trades_today,
            "Shutdown complete"
        );

        match Metrics::gather_text() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Metrics unavailable"),
        }
    }
}
