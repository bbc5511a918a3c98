use std::sync::Arc;

use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use reqwest_eventsource::{Error as SseError, Event as SseEvent, EventSource};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    error::Result,
    types::{ClientConfig, ConnectionState, StreamEvent},
};

/// SSE event name the server uses for stream messages.
const MESSAGE_EVENT: &str = "message";

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<StreamEvent>>>>;

/// Position of the last delivered event.
///
/// The server tags event ids with its start epoch, so a restarted server
/// that numbers from zero again is told apart from a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    epoch: Option<u64>,
    seq: u64,
}

/// Splits an SSE id of the form `<epoch>-<seq>`. A bare `<seq>` has no epoch.
fn parse_event_id(id: &str) -> (Option<u64>, Option<u64>) {
    match id.split_once('-') {
        Some((epoch, seq)) => (epoch.parse().ok(), seq.parse().ok()),
        None => (None, id.parse().ok()),
    }
}

/// Event reader - read-only stream subscriber
///
/// Connects to a stream over SSE and fans every message out to local
/// subscribers. The server replays the full history on each connection, so
/// after a reconnect the reader skips sequence numbers it has already emitted.
/// Each subscriber has its own unbounded queue, so a slow subscriber never
/// loses events.
///
/// # Example
///
/// ```ignore
/// use eventcast_sdk::{EventReader, ClientConfig};
///
/// let config = ClientConfig::new("http://localhost:9012");
/// let mut reader = EventReader::new("orders", config);
///
/// // Subscribe to events
/// let mut rx = reader.subscribe();
///
/// // Connect and start receiving
/// reader.connect().await?;
///
/// while let Some(event) = rx.recv().await {
///     println!("Received: {:?}", event);
/// }
/// ```
pub struct EventReader {
    /// Stream name
    stream: String,

    /// Configuration
    config: ClientConfig,

    /// Connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Local subscriber queues
    subscribers: Subscribers,

    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,

    /// Reconnection attempt counter
    reconnect_attempts: Arc<RwLock<u32>>,

    /// Last event emitted so far
    cursor: Arc<RwLock<Option<Cursor>>>,
}

impl EventReader {
    /// Create a new event reader for the given stream
    pub fn new(stream: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            stream: stream.into(),
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: None,
            reconnect_attempts: Arc::new(RwLock::new(0)),
            cursor: Arc::new(RwLock::new(None)),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Highest sequence number delivered to subscribers
    pub fn last_seq(&self) -> Option<u64> {
        self.cursor.read().map(|cursor| cursor.seq)
    }

    /// Subscribe to events from this reader
    ///
    /// Returns a receiver that will receive every event emitted after this
    /// call. Multiple subscribers can be created. The receiver yields `None`
    /// once the reader is dropped.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Connect to the stream and start receiving events
    pub async fn connect(&mut self) -> Result<()> {
        if matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            return Ok(());
        }

        let url = self.config.url(&[self.stream.as_str()])?;
        self.set_state(ConnectionState::Connecting);
        info!(stream = %self.stream, url = %url, "Connecting to stream");

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let connection = Connection {
            url,
            stream: self.stream.clone(),
            subscribers: Arc::clone(&self.subscribers),
            state: Arc::clone(&self.state),
            reconnect_attempts: Arc::clone(&self.reconnect_attempts),
            cursor: Arc::clone(&self.cursor),
            config: self.config.clone(),
        };

        tokio::spawn(connection.run(shutdown_rx));

        Ok(())
    }

    /// Disconnect from the stream
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        self.set_state(ConnectionState::Disconnected);
        info!(stream = %self.stream, "Disconnected from stream");
    }

    /// Set the connection state
    fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write();
        *state = new_state;
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        // Signal shutdown synchronously
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }
}

/// What the connection task does after the current EventSource ends.
enum Next {
    Reconnect,
    Stop,
}

/// State moved into the background connection task.
struct Connection {
    url: reqwest::Url,
    stream: String,
    subscribers: Subscribers,
    state: Arc<RwLock<ConnectionState>>,
    reconnect_attempts: Arc<RwLock<u32>>,
    cursor: Arc<RwLock<Option<Cursor>>>,
    config: ClientConfig,
}

impl Connection {
    /// Run the SSE connection loop
    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let client = reqwest::Client::new();

        loop {
            let mut es = match EventSource::new(client.get(self.url.clone())) {
                Ok(es) => es,
                Err(e) => {
                    error!(stream = %self.stream, error = %e, "Failed to create EventSource");
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            };

            let next = loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(stream = %self.stream, "Shutdown signal received");
                        es.close();
                        return;
                    }
                    event = es.next() => {
                        match event {
                            Some(Ok(SseEvent::Open)) => {
                                self.set_state(ConnectionState::Connected);
                                *self.reconnect_attempts.write() = 0;
                                info!(stream = %self.stream, "Connected to stream");
                            }
                            Some(Ok(SseEvent::Message(msg))) => {
                                if msg.event != MESSAGE_EVENT {
                                    debug!(stream = %self.stream, event = %msg.event, "Ignoring event");
                                    continue;
                                }
                                self.handle_message(&msg.id, &msg.data);
                            }
                            Some(Err(SseError::InvalidStatusCode(status, _))) => {
                                error!(stream = %self.stream, status = %status, "Stream rejected subscription");
                                break Next::Stop;
                            }
                            Some(Err(SseError::StreamEnded)) | None => {
                                info!(stream = %self.stream, "SSE stream ended");
                                break Next::Reconnect;
                            }
                            Some(Err(e)) => {
                                error!(stream = %self.stream, error = %e, "SSE error");
                                break Next::Reconnect;
                            }
                        }
                    }
                }
            };

            // Connection lost - attempt reconnect if enabled
            es.close();

            if matches!(next, Next::Stop) || !self.config.auto_reconnect {
                self.set_state(ConnectionState::Disconnected);
                return;
            }

            // Check max attempts
            {
                let mut attempts = self.reconnect_attempts.write();
                *attempts += 1;
                if self.config.max_reconnect_attempts > 0
                    && *attempts >= self.config.max_reconnect_attempts
                {
                    error!(
                        stream = %self.stream,
                        attempts = *attempts,
                        "Max reconnection attempts reached"
                    );
                    drop(attempts);
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            }

            self.set_state(ConnectionState::Reconnecting);
            info!(
                stream = %self.stream,
                delay_ms = self.config.reconnect_delay_ms,
                "Scheduling reconnection"
            );

            tokio::select! {
                _ = shutdown_rx.recv() => return,
                _ = tokio::time::sleep(tokio::time::Duration::from_millis(
                    self.config.reconnect_delay_ms,
                )) => {}
            }
        }
    }

    /// Parse one SSE message and fan it out unless already delivered.
    fn handle_message(&self, id: &str, data: &str) {
        let payload = match serde_json::from_str::<serde_json::Value>(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(stream = %self.stream, error = %e, data = %data, "Failed to parse event");
                return;
            }
        };

        let (epoch, seq) = parse_event_id(id);
        if let Some(seq) = seq {
            let mut cursor = self.cursor.write();
            if let Some(last) = *cursor {
                if last.epoch != epoch {
                    info!(
                        stream = %self.stream,
                        previous = ?last.epoch,
                        current = ?epoch,
                        "Server restarted, resetting replay cursor"
                    );
                } else if seq <= last.seq {
                    debug!(stream = %self.stream, seq = seq, "Skipping replayed event");
                    return;
                }
            }
            *cursor = Some(Cursor { epoch, seq });
        }

        debug!(stream = %self.stream, seq = ?seq, "Received event");
        let event = StreamEvent { seq, payload };
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_state(&self, new_state: ConnectionState) {
        *self.state.write() = new_state;
    }
}
