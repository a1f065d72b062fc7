//! Listen key keepalive.
//!
//! The exchange expires a listen key after 60 minutes without a renewal.
//! The keeper renews on a fixed interval (30 minutes by default) and
//! tracks the outcome so the stream can tell a healthy key from one that
//! must be replaced.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use spotbot_exchange::ExchangeClient;
use spotbot_telemetry::Metrics;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Renewal bookkeeping for one user data stream.
#[derive(Debug)]
pub struct ListenKeyKeeper {
    interval: Duration,
    last_renewal: RwLock<Option<DateTime<Utc>>>,
    consecutive_failures: AtomicU32,
}

impl ListenKeyKeeper {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_renewal: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Renew `listen_key`. Returns whether the exchange accepted it.
    pub async fn renew(&self, client: &dyn ExchangeClient, listen_key: &str) -> bool {
        let ok = client.keep_alive_listen_key(listen_key).await;
        Metrics::listen_key_renewal(ok);

        if ok {
            *self.last_renewal.write() = Some(Utc::now());
            self.consecutive_failures.store(0, Ordering::Relaxed);
            debug!("Listen key renewed");
        } else {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(failures, "Listen key renewal failed");
        }
        ok
    }

    /// Time of the last accepted renewal.
    pub fn last_renewal(&self) -> Option<DateTime<Utc>> {
        *self.last_renewal.read()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Forget renewal history when a new key is issued.
    pub fn reset(&self) {
        *self.last_renewal.write() = None;
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }
}
