//! User data stream lifecycle integration tests.
//!
//! Tests the stream against a local WebSocket server:
//! - Connection with the issued listen key
//! - Event dispatch and tolerance of malformed frames
//! - Reconnect with the same key after a server close
//! - Fresh key after a rejected handshake, an expiry event or a failed renewal
//! - Bounded disconnect

mod integration;
use integration::common::fixtures::{execution_report, wait_until};
use integration::common::mock_ws::MockWsServer;

use spotbot_core::OrderStatus;
use spotbot_exchange::{MockCall, MockExchange};
use spotbot_ws::{ChannelSubscriber, ConnectionState, StreamConfig, UserDataEvent, UserDataStream};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn stream_config(server: &MockWsServer) -> StreamConfig {
    StreamConfig {
        url: server.url(),
        reconnect_base_delay_ms: 20,
        reconnect_max_delay_ms: 200,
        connect_timeout_ms: 2000,
        ..Default::default()
    }
}

fn start_stream(config: StreamConfig, mock: Arc<MockExchange>) -> Arc<UserDataStream> {
    let stream = Arc::new(UserDataStream::new(config, mock));
    stream.start().unwrap();
    stream
}

async fn wait_connected(server: &MockWsServer, stream: &UserDataStream, live: u32) {
    let ok = wait_until(WAIT, || async {
        stream.is_connected() && server.live_connections() >= live
    })
    .await;
    assert!(ok, "stream should connect within {WAIT:?}");
}

#[tokio::test]
async fn test_connects_with_listen_key_path() {
    let server = MockWsServer::start().await;
    let mock = Arc::new(MockExchange::new());
    let stream = start_stream(stream_config(&server), mock.clone());

    wait_connected(&server, &stream, 1).await;
    assert_eq!(server.paths().await, vec!["/ws/listen-key-1".to_string()]);
    assert_eq!(stream.listen_key().as_deref(), Some("listen-key-1"));
    assert_eq!(stream.state(), ConnectionState::Connected);

    stream.disconnect(Duration::from_secs(2)).await;
    assert_eq!(stream.state(), ConnectionState::Disconnected);
    assert!(wait_until(WAIT, || async { server.live_connections() == 0 }).await);
    server.shutdown().await;
}

#[tokio::test]
async fn test_events_dispatched_and_garbage_dropped() {
    let server = MockWsServer::start().await;
    let mock = Arc::new(MockExchange::new());
    let stream = Arc::new(UserDataStream::new(stream_config(&server), mock));
    let (subscriber, mut rx) = ChannelSubscriber::new();
    stream.subscribe(Arc::new(subscriber));
    stream.start().unwrap();
    wait_connected(&server, &stream, 1).await;

    server.push("this is not json");
    server.push(r#"{"e":"somethingNew","E":1}"#);
    server.push(execution_report(42, "FILLED"));

    let event = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let UserDataEvent::ExecutionReport(report) = event else {
        panic!("expected execution report, got {event:?}");
    };
    assert_eq!(report.order_id, 42);
    assert_eq!(report.status, OrderStatus::Filled);

    // Still on the first connection.
    assert_eq!(server.connection_attempts().await, 1);
    assert!(stream.is_connected());

    stream.disconnect(Duration::from_secs(2)).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_with_same_key_after_server_close() {
    let server = MockWsServer::start().await;
    let mock = Arc::new(MockExchange::new());
    let stream = start_stream(stream_config(&server), mock.clone());
    wait_connected(&server, &stream, 1).await;

    server.close_all();
    let reconnected = wait_until(WAIT, || async {
        server.connection_attempts().await >= 2 && stream.is_connected()
    })
    .await;
    assert!(reconnected, "stream should reconnect after a server close");

    let paths = server.paths().await;
    assert!(paths.iter().all(|p| p == "/ws/listen-key-1"), "paths = {paths:?}");
    assert_eq!(mock.listen_keys_issued(), 1);

    stream.disconnect(Duration::from_secs(2)).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_rejected_handshake_requests_new_key() {
    let server = MockWsServer::start().await;
    server.reject_next_handshakes(1);
    let mock = Arc::new(MockExchange::new());
    let stream = start_stream(stream_config(&server), mock.clone());

    wait_connected(&server, &stream, 1).await;
    assert_eq!(
        server.paths().await,
        vec!["/ws/listen-key-1".to_string(), "/ws/listen-key-2".to_string()]
    );
    assert_eq!(mock.listen_keys_issued(), 2);

    stream.disconnect(Duration::from_secs(2)).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_listen_key_expired_event_requests_new_key() {
    let server = MockWsServer::start().await;
    let mock = Arc::new(MockExchange::new());
    let stream = start_stream(stream_config(&server), mock.clone());
    wait_connected(&server, &stream, 1).await;

    server.push(r#"{"e":"listenKeyExpired","E":1576653824250}"#);
    let renewed = wait_until(WAIT, || async {
        stream.listen_key().as_deref() == Some("listen-key-2") && stream.is_connected()
    })
    .await;
    assert!(renewed, "stream should reconnect with a fresh key");
    assert!(server
        .paths()
        .await
        .contains(&"/ws/listen-key-2".to_string()));

    stream.disconnect(Duration::from_secs(2)).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_failed_renewal_forces_reconnect_with_new_key() {
    let server = MockWsServer::start().await;
    let mock = Arc::new(MockExchange::new());
    mock.set_keep_alive_ok(false);
    let config = StreamConfig {
        keepalive_interval_ms: 100,
        ..stream_config(&server)
    };
    let stream = start_stream(config, mock.clone());

    let reconnected = wait_until(WAIT, || async {
        server
            .paths()
            .await
            .contains(&"/ws/listen-key-2".to_string())
    })
    .await;
    assert!(reconnected, "a failed renewal should lead to a fresh key");

    // The first key was renewed (and refused) before the second was issued.
    let calls = mock.calls();
    let renewal = calls
        .iter()
        .position(|c| *c == MockCall::KeepAlive("listen-key-1".to_string()))
        .expect("first key should have been renewed");
    let reissue = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == MockCall::GetListenKey)
        .nth(1)
        .map(|(i, _)| i)
        .expect("a second key should have been requested");
    assert!(renewal < reissue, "calls = {calls:?}");

    stream.disconnect(Duration::from_secs(2)).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_retries_while_listen_key_unavailable() {
    let server = MockWsServer::start().await;
    let mock = Arc::new(MockExchange::new());
    mock.set_listen_key_fails(true);
    let stream = start_stream(stream_config(&server), mock.clone());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!stream.is_connected());
    assert_eq!(server.connection_attempts().await, 0);

    mock.set_listen_key_fails(false);
    wait_connected(&server, &stream, 1).await;
    assert_eq!(server.paths().await, vec!["/ws/listen-key-1".to_string()]);

    stream.disconnect(Duration::from_secs(2)).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_while_backing_off_is_prompt() {
    let mock = Arc::new(MockExchange::new());
    let config = StreamConfig {
        // Nothing listens here.
        url: "ws://127.0.0.1:9/ws".to_string(),
        reconnect_base_delay_ms: 60_000,
        reconnect_max_delay_ms: 60_000,
        connect_timeout_ms: 500,
        ..Default::default()
    };
    let stream = start_stream(config, mock);

    let backing_off = wait_until(WAIT, || async {
        stream.state() == ConnectionState::Reconnecting
    })
    .await;
    assert!(backing_off);

    let started = tokio::time::Instant::now();
    stream.disconnect(Duration::from_secs(2)).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(stream.state(), ConnectionState::Disconnected);
}
