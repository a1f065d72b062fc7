//! User data stream connection manager.
//!
//! Owns the listen key, the live socket and two supervised tasks: the
//! connection loop (connect, read, reconnect with backoff) and the
//! keepalive loop (renew the listen key on its own timer).

use crate::backoff::ReconnectBackoff;
use crate::error::{WsError, WsResult};
use crate::event::{decode_event, UserDataEvent, UserDataHandler};
use crate::keepalive::ListenKeyKeeper;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use spotbot_exchange::ExchangeClient;
use spotbot_telemetry::Metrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::connect_async_tls_with_config;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket base URL; the listen key is appended as the last path segment.
    pub url: String,
    /// First reconnect delay.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay cap.
    pub reconnect_max_delay_ms: u64,
    /// Listen key renewal interval.
    pub keepalive_interval_ms: u64,
    /// Bound on a single connect + handshake.
    pub connect_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 300_000,
            keepalive_interval_ms: 1_800_000, // 30 minutes
            connect_timeout_ms: 10_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated user data stream.
///
/// One session per instance: after `disconnect` the stream is closed for
/// good and `start` returns [`WsError::SessionClosed`].
pub struct UserDataStream {
    config: StreamConfig,
    client: Arc<dyn ExchangeClient>,
    state: RwLock<ConnectionState>,
    listen_key: RwLock<Option<String>>,
    subscribers: RwLock<Vec<Arc<dyn UserDataHandler>>>,
    keeper: ListenKeyKeeper,
    /// Wakes the connection loop when a keepalive fails.
    renewal_failed: Notify,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_token: CancellationToken,
}

impl UserDataStream {
    pub fn new(config: StreamConfig, client: Arc<dyn ExchangeClient>) -> Self {
        let keeper = ListenKeyKeeper::new(Duration::from_millis(config.keepalive_interval_ms));
        Self {
            config,
            client,
            state: RwLock::new(ConnectionState::Disconnected),
            listen_key: RwLock::new(None),
            subscribers: RwLock::new(Vec::new()),
            keeper,
            renewal_failed: Notify::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Register an event subscriber. Subscribers added after `start` see
    /// events from the next message on.
    pub fn subscribe(&self, handler: Arc<dyn UserDataHandler>) {
        self.subscribers.write().push(handler);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Listen key currently in use, if one has been issued.
    pub fn listen_key(&self) -> Option<String> {
        self.listen_key.read().clone()
    }

    pub fn keeper(&self) -> &ListenKeyKeeper {
        &self.keeper
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Spawn the connection and keepalive tasks.
    pub fn start(self: &Arc<Self>) -> WsResult<()> {
        if self.is_shutdown() {
            return Err(WsError::SessionClosed);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(WsError::AlreadyStarted);
        }

        info!(url = %self.config.url, "Starting user data stream");

        let connection = {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_connection_loop().await })
        };
        let keepalive = {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_keepalive_loop().await })
        };
        self.tasks.lock().extend([connection, keepalive]);
        Ok(())
    }

    /// Stop both tasks and close the socket.
    ///
    /// Tasks get `join_timeout` in total to finish; any still running after
    /// that are aborted.
    pub async fn disconnect(&self, join_timeout: Duration) {
        info!("User data stream disconnect requested");
        self.shutdown_token.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        let deadline = tokio::time::Instant::now() + join_timeout;
        for mut handle in handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!("Stream task did not stop in time, aborting");
                handle.abort();
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("User data stream disconnected");
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        Metrics::stream_state(state.as_str());
    }

    async fn run_connection_loop(self: Arc<Self>) {
        let mut backoff = ReconnectBackoff::new(
            Duration::from_millis(self.config.reconnect_base_delay_ms),
            Duration::from_millis(self.config.reconnect_max_delay_ms),
        );

        loop {
            if self.is_shutdown() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            let result = self.run_session(&mut backoff).await;

            if self.is_shutdown() {
                info!("Shutdown requested, not reconnecting");
                break;
            }

            let reason = match &result {
                Ok(()) => "stream_ended",
                Err(e) => e.reason(),
            };
            match result {
                Ok(()) => warn!("User data stream ended"),
                Err(e) => error!(error = %e, "User data stream error"),
            }
            Metrics::stream_reconnect(reason);

            self.set_state(ConnectionState::Reconnecting);
            let delay = backoff.next_delay();
            warn!(
                failures = backoff.failures(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting user data stream"
            );

            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff");
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// One connection: obtain a key, connect, read until the socket ends.
    /// `Ok` means shutdown or a clean end of stream.
    async fn run_session(&self, backoff: &mut ReconnectBackoff) -> WsResult<()> {
        // Registered before connecting so a renewal failure that lands
        // during the handshake is not missed.
        let renewal_failed = self.renewal_failed.notified();
        tokio::pin!(renewal_failed);

        let listen_key = self.ensure_listen_key().await?;
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), listen_key);
        info!(url = %self.config.url, "Connecting user data stream");

        let connect = tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            connect_async_tls_with_config(url.as_str(), None, true, None),
        );
        let connected = tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => return Ok(()),
            result = connect => result,
        };
        let ws_stream = match connected {
            Err(_) => return Err(WsError::ConnectTimeout(self.config.connect_timeout_ms)),
            Ok(Err(tungstenite::Error::Http(response))) => {
                let status = response.status();
                if status.is_client_error() {
                    warn!(%status, "Handshake rejected, discarding listen key");
                    self.invalidate_listen_key(&listen_key);
                }
                return Err(WsError::Tungstenite(tungstenite::Error::Http(response)));
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok((stream, _response))) => stream,
        };

        let (mut write, mut read) = ws_stream.split();
        self.set_state(ConnectionState::Connected);
        backoff.reset();
        info!("User data stream connected");

        loop {
            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send close frame during shutdown");
                    }
                    return Ok(());
                }

                () = &mut renewal_failed => {
                    warn!("Listen key renewal failed, dropping connection");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send close frame after renewal failure");
                    }
                    return Err(WsError::ListenKeyRenewalFailed);
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.handle_text_message(&text, &listen_key) {
                                if let Err(close_err) = write.send(Message::Close(None)).await {
                                    warn!(
                                        error = %close_err,
                                        "Failed to send close frame after key expiry"
                                    );
                                }
                                return Err(e);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "User data stream closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "User data stream read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("User data stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Decode one message and dispatch it. Undecodable messages are dropped;
    /// only an expired listen key ends the session.
    fn handle_text_message(&self, text: &str, listen_key: &str) -> WsResult<()> {
        let event = match decode_event(text) {
            Ok(event) => event,
            Err(e) => {
                Metrics::stream_decode_error();
                warn!(error = %e, "Dropping undecodable user data message");
                return Ok(());
            }
        };
        Metrics::stream_event(event.kind());

        match &event {
            UserDataEvent::ExecutionReport(report) => {
                debug!(
                    order_id = report.order_id,
                    symbol = %report.symbol,
                    status = %report.status,
                    "Execution report"
                );
            }
            UserDataEvent::AccountPosition(position) => {
                info!(balances = position.balances.len(), "Account position update");
            }
            UserDataEvent::BalanceUpdate(update) => {
                info!(asset = %update.asset, delta = %update.delta, "Balance update");
            }
            UserDataEvent::ListenKeyExpired => {
                warn!("Listen key expired");
                self.invalidate_listen_key(listen_key);
                return Err(WsError::ListenKeyExpired);
            }
            UserDataEvent::Unknown => {
                debug!("Ignoring unrecognized user data event");
                return Ok(());
            }
        }

        self.dispatch(&event);
        Ok(())
    }

    fn dispatch(&self, event: &UserDataEvent) {
        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers {
            subscriber.on_event(event);
        }
    }

    async fn ensure_listen_key(&self) -> WsResult<String> {
        if let Some(key) = self.listen_key() {
            return Ok(key);
        }
        let key = self.client.get_listen_key().await?;
        self.keeper.reset();
        *self.listen_key.write() = Some(key.clone());
        info!("Listen key issued");
        Ok(key)
    }

    /// Clear the cached key if it is still `key`.
    fn invalidate_listen_key(&self, key: &str) {
        let mut current = self.listen_key.write();
        if current.as_deref() == Some(key) {
            *current = None;
        }
    }

    async fn run_keepalive_loop(self: Arc<Self>) {
        let interval = self.keeper.interval();
        loop {
            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }

            let Some(key) = self.listen_key() else {
                debug!("No listen key to renew");
                continue;
            };

            let renewed = tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                ok = self.keeper.renew(self.client.as_ref(), &key) => ok,
            };
            if !renewed {
                self.invalidate_listen_key(&key);
                self.renewal_failed.notify_waiters();
            }
        }
        debug!("Keepalive loop stopped");
    }
}
