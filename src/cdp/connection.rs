//! CDP WebSocket connection implementation
//!
//! The socket is split once at connect time: the write half sits behind a
//! mutex for `send_command`, the read half is owned by a spawned reader task
//! that routes responses to their pending command and broadcasts events.

use super::traits::{CdpConnection, CdpError as CdpErrorResponse, CdpEvent, CdpResponse};
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, PendingCommand>>>;
type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<CdpEvent>>>>;

/// CDP timeout configuration
#[derive(Debug, Clone)]
struct CdpTimeoutConfig {
    /// Default timeout for most commands (seconds)
    default_timeout_secs: u64,
    /// Timeout for screenshot commands (seconds)
    screenshot_timeout_secs: u64,
    /// Timeout for page navigation commands (seconds)
    navigation_timeout_secs: u64,
    /// Timeout for JavaScript execution (seconds)
    execution_timeout_secs: u64,
}

impl Default for CdpTimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            screenshot_timeout_secs: 90,
            navigation_timeout_secs: 60,
            execution_timeout_secs: 30,
        }
    }
}

impl CdpTimeoutConfig {
    /// Get timeout duration for a specific command method
    fn timeout_for(&self, method: &str) -> Duration {
        let method_lower = method.to_lowercase();

        if method_lower.contains("screenshot") || method_lower.contains("capture") {
            return Duration::from_secs(self.screenshot_timeout_secs);
        }

        if method_lower.contains("navigate") || method_lower.contains("reload") {
            return Duration::from_secs(self.navigation_timeout_secs);
        }

        if method_lower.starts_with("runtime.evaluate") || method_lower.starts_with("runtime.call") {
            return Duration::from_secs(self.execution_timeout_secs);
        }

        Duration::from_secs(self.default_timeout_secs)
    }
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpResponse>,
    /// Command method (for logging)
    method: String,
}

/// CDP WebSocket connection implementation
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// Write half of the socket
    sink: Mutex<SplitSink<WsStream, Message>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending: PendingMap,
    /// Event subscribers
    subscribers: Subscribers,
    /// Cleared by `close` or when the reader task ends
    is_active: Arc<AtomicBool>,
    /// Timeout configuration
    timeout_config: CdpTimeoutConfig,
}

impl std::fmt::Debug for CdpWebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpWebSocketConnection")
            .field("url", &self.url)
            .field("is_active", &self.is_active.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CdpWebSocketConnection {
    /// Connect to a CDP WebSocket endpoint
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn new<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        let url = url.into();
        info!("Connecting to CDP WebSocket: {}", url);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect to {}: {}", url, e)))?;

        let (sink, stream) = ws_stream.split();

        let connection = Arc::new(Self {
            url,
            sink: Mutex::new(sink),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            is_active: Arc::new(AtomicBool::new(true)),
            timeout_config: CdpTimeoutConfig::default(),
        });

        tokio::spawn(Self::read_loop(
            stream,
            Arc::clone(&connection.pending),
            Arc::clone(&connection.subscribers),
            Arc::clone(&connection.is_active),
        ));

        info!("WebSocket connection established");
        Ok(connection)
    }

    /// Reader task: runs until the socket closes or errors
    async fn read_loop(
        mut stream: SplitStream<WsStream>,
        pending: PendingMap,
        subscribers: Subscribers,
        is_active: Arc<AtomicBool>,
    ) {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => Self::dispatch(&text, &pending, &subscribers).await,
                Ok(Message::Close(_)) => {
                    info!("WebSocket close frame received");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket read error: {}", e);
                    break;
                }
            }
        }

        is_active.store(false, Ordering::SeqCst);

        // Dropping the senders wakes every waiter with a closed channel.
        let abandoned = pending.lock().await.drain().count();
        if abandoned > 0 {
            warn!("CDP connection ended with {} commands in flight", abandoned);
        }
        subscribers.lock().await.clear();
        debug!("CDP reader task exited");
    }

    /// Route one incoming text frame
    async fn dispatch(text: &str, pending: &PendingMap, subscribers: &Subscribers) {
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            match pending.lock().await.remove(&response.id) {
                Some(command) => {
                    debug!("Response for command {}: {}", response.id, command.method);
                    let _ = command.sender.send(CdpResponse {
                        id: response.id,
                        result: Some(response.result),
                        error: response.error.map(|e| CdpErrorResponse {
                            code: e.code,
                            message: e.message,
                        }),
                    });
                }
                None => warn!("Received response for unknown command ID: {}", response.id),
            }
            return;
        }

        if let Ok(notification) = serde_json::from_str::<CdpNotification>(text) {
            debug!("Received event: {}", notification.method);
            let event = CdpEvent {
                method: notification.method,
                params: notification.params,
            };
            subscribers
                .lock()
                .await
                .retain(|sender| sender.send(event.clone()).is_ok());
            return;
        }

        warn!("Unknown message format: {}", text);
    }
}

#[async_trait]
impl CdpConnection for CdpWebSocketConnection {
    /// Send a CDP command and wait for response
    async fn send_command(&self, method: &str, params: serde_json::Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::session_closed(format!("CDP connection to {} is closed", self.url)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
        };

        let json = serde_json::to_string(&request)
            .map_err(|e| Error::cdp(format!("Failed to serialize request: {}", e)))?;

        debug!("Sending CDP command {}: {}", id, method);

        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(
            id,
            PendingCommand {
                sender,
                method: method.to_string(),
            },
        );

        let sent = self.sink.lock().await.send(Message::Text(json)).await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(Error::websocket(format!("Failed to send {}: {}", method, e)));
        }

        let timeout_duration = self.timeout_config.timeout_for(method);

        match tokio::time::timeout(timeout_duration, receiver).await {
            Ok(Ok(response)) => {
                if let Some(error) = &response.error {
                    return Err(Error::cdp(format!(
                        "{}: {} (code: {})",
                        method, error.message, error.code
                    )));
                }
                Ok(response)
            }
            Ok(Err(_)) => Err(Error::session_closed(format!(
                "Connection closed while waiting for {}",
                method
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::timeout(format!(
                    "Command {} ({}) timed out after {:?}",
                    id, method, timeout_duration
                )))
            }
        }
    }

    /// Subscribe to CDP events
    async fn listen_events(&self) -> Result<mpsc::Receiver<CdpEvent>, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::session_closed("CDP connection is closed"));
        }

        let (sender, receiver) = mpsc::channel(100);
        let (unbounded_sender, mut unbounded_receiver) = mpsc::unbounded_channel();

        self.subscribers.lock().await.push(unbounded_sender);

        // Forward events to bounded channel
        tokio::spawn(async move {
            while let Some(event) = unbounded_receiver.recv().await {
                if sender.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(receiver)
    }

    /// Close the connection
    async fn close(&self) -> Result<(), Error> {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            debug!("CDP connection to {} already closed", self.url);
            return Ok(());
        }

        info!("Closing CDP WebSocket connection to {}", self.url);

        if let Err(e) = self.sink.lock().await.close().await {
            debug!("WebSocket close handshake failed: {}", e);
        }
        self.pending.lock().await.clear();

        Ok(())
    }

    /// Check if connection is active
    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
