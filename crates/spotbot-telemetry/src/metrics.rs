//! Prometheus metrics for the spot trading bot.
//!
//! Collectors register with the default registry on first use.
//!
//! # Panics
//!
//! Registration uses `unwrap()`. A failure means a duplicate metric name,
//! which is a programming error and should crash at first use.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};

/// Signals generated. Labels: signal (BUY/SELL/HOLD)
pub static SIGNALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("spotbot_signals_total", "Signals generated", &["signal"]).unwrap()
});

/// Orders accepted by the exchange. Labels: side
pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spotbot_orders_placed_total",
        "Orders accepted by the exchange",
        &["side"]
    )
    .unwrap()
});

/// Orders not placed. Labels: reason
pub static ORDERS_ABORTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spotbot_orders_aborted_total",
        "Orders aborted locally or rejected by the exchange",
        &["reason"]
    )
    .unwrap()
});

/// Confirmed cancels.
pub static ORDERS_CANCELLED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("spotbot_orders_cancelled_total", "Confirmed order cancels").unwrap()
});

/// Orders currently tracked as active.
pub static ACTIVE_ORDERS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("spotbot_active_orders", "Orders currently tracked as active").unwrap()
});

/// 1 while the position is open.
pub static IN_POSITION: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("spotbot_in_position", "Position open (1) or flat (0)").unwrap()
});

/// User data stream state. Labels: state
pub static STREAM_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "spotbot_stream_state",
        "User data stream state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Reconnect attempts. Labels: reason
pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spotbot_stream_reconnect_total",
        "User data stream reconnect attempts",
        &["reason"]
    )
    .unwrap()
});

/// Decoded events. Labels: kind
pub static STREAM_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spotbot_stream_events_total",
        "User data stream events received",
        &["kind"]
    )
    .unwrap()
});

/// Messages dropped because they failed to decode.
pub static STREAM_DECODE_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spotbot_stream_decode_errors_total",
        "User data stream messages dropped on decode failure"
    )
    .unwrap()
});

/// Listen key renewals. Labels: outcome (ok/failed)
pub static LISTEN_KEY_RENEWALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spotbot_listen_key_renewals_total",
        "Listen key keepalive calls",
        &["outcome"]
    )
    .unwrap()
});

const STREAM_STATES: [&str; 4] = ["disconnected", "connecting", "connected", "reconnecting"];

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn signal_generated(signal: &str) {
        SIGNALS_TOTAL.with_label_values(&[signal]).inc();
    }

    pub fn order_placed(side: &str) {
        ORDERS_PLACED_TOTAL.with_label_values(&[side]).inc();
    }

    pub fn order_aborted(reason: &str) {
        ORDERS_ABORTED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn order_cancelled() {
        ORDERS_CANCELLED_TOTAL.inc();
    }

    pub fn active_orders(count: usize) {
        ACTIVE_ORDERS.set(count as f64);
    }

    pub fn in_position(open: bool) {
        IN_POSITION.set(if open { 1.0 } else { 0.0 });
    }

    /// Only the active state is set to 1.
    pub fn stream_state(state: &str) {
        for s in STREAM_STATES {
            STREAM_STATE.with_label_values(&[s]).set(0.0);
        }
        STREAM_STATE.with_label_values(&[state]).set(1.0);
    }

    pub fn stream_reconnect(reason: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn stream_event(kind: &str) {
        STREAM_EVENTS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn stream_decode_error() {
        STREAM_DECODE_ERRORS_TOTAL.inc();
    }

    pub fn listen_key_renewal(ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        LISTEN_KEY_RENEWALS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Render the default registry in the text exposition format.
    pub fn gather_text() -> TelemetryResult<String> {
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_state_single_active() {
        Metrics::stream_state("connected");
        assert_eq!(STREAM_STATE.with_label_values(&["connected"]).get(), 1.0);
        assert_eq!(STREAM_STATE.with_label_values(&["reconnecting"]).get(), 0.0);

        Metrics::stream_state("reconnecting");
        assert_eq!(STREAM_STATE.with_label_values(&["connected"]).get(), 0.0);
    }

    #[test]
    fn test_gather_text_includes_counters() {
        Metrics::signal_generated("HOLD");
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("spotbot_signals_total"));
    }
}
