//! Mock user data stream server for integration tests.
//!
//! Provides a WebSocket server that can:
//! - Accept connections and record the request path (which carries the listen key)
//! - Reject a number of upcoming handshakes with an HTTP status
//! - Push text frames to every live connection
//! - Close every live connection

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
enum ServerCommand {
    Text(String),
    Close,
}

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    commands: broadcast::Sender<ServerCommand>,
    paths: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicU32>,
    reject_next: Arc<AtomicU32>,
}

impl MockWsServer {
    /// Start a new mock server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (commands, _) = broadcast::channel(64);
        let paths: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let live = Arc::new(AtomicU32::new(0));
        let reject_next = Arc::new(AtomicU32::new(0));

        let server = Self {
            addr,
            shutdown_tx,
            commands: commands.clone(),
            paths: paths.clone(),
            live: live.clone(),
            reject_next: reject_next.clone(),
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            commands.subscribe(),
                            paths.clone(),
                            live.clone(),
                            reject_next.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        server
    }

    /// Base URL to configure the stream with; the listen key is appended.
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Request paths of every handshake, accepted or not.
    pub async fn paths(&self) -> Vec<String> {
        self.paths.lock().await.clone()
    }

    pub async fn connection_attempts(&self) -> usize {
        self.paths.lock().await.len()
    }

    /// Connections currently open.
    pub fn live_connections(&self) -> u32 {
        self.live.load(Ordering::SeqCst)
    }

    /// Reject the next `count` handshakes with 400 Bad Request.
    pub fn reject_next_handshakes(&self, count: u32) {
        self.reject_next.store(count, Ordering::SeqCst);
    }

    /// Send a text frame to every live connection.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.commands.send(ServerCommand::Text(text.into()));
    }

    /// Close every live connection.
    pub fn close_all(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut commands: broadcast::Receiver<ServerCommand>,
    paths: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicU32>,
    reject_next: Arc<AtomicU32>,
) {
    let mut path = String::new();
    let reject = reject_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        path = request.uri().path().to_string();
        if reject {
            let mut error = ErrorResponse::new(Some("listen key does not exist".to_string()));
            *error.status_mut() = StatusCode::BAD_REQUEST;
            return Err(error);
        }
        Ok(response)
    };
    let accepted = accept_hdr_async(stream, callback).await;
    paths.lock().await.push(path);

    let Ok(ws_stream) = accepted else {
        return;
    };

    live.fetch_add(1, Ordering::SeqCst);
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            command = commands.recv() => {
                match command {
                    Ok(ServerCommand::Text(text)) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(ServerCommand::Close) => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    live.fetch_sub(1, Ordering::SeqCst);
}
