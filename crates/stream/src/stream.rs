//! A single named stream: append-only history plus the set of live sinks.
//!
//! History, sequence counter and sink set sit behind one mutex. `append` and
//! `subscribe` both take it, so a subscriber either sees a message in its
//! replay snapshot or receives it live, never both and never neither.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    error::StreamError,
    sink::{Sink, SinkId},
    types::{Message, Payload, StreamInfo, StreamName},
};

struct StreamState {
    history: Vec<Arc<Message>>,
    next_seq: u64,
    next_sink_id: SinkId,
    sinks: HashMap<SinkId, mpsc::UnboundedSender<Arc<Message>>>,
}

/// Named, ordered, append-only log of messages and its live subscribers.
pub struct Stream {
    name: StreamName,
    state: Mutex<StreamState>,
}

impl Stream {
    /// Create an empty stream.
    pub fn new(name: impl Into<StreamName>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(StreamState {
                history: Vec::new(),
                next_seq: 0,
                next_sink_id: 0,
                sinks: HashMap::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a message and fan it out to every registered sink.
    ///
    /// Delivery is a non-blocking send on each sink's unbounded queue. A sink
    /// whose receiving side is gone is dropped from the set here; that never
    /// fails the append.
    pub fn append(&self, payload: Payload) -> Result<Arc<Message>, StreamError> {
        let mut state = self.state.lock();

        let seq = state.next_seq;
        let next_seq = seq.checked_add(1).ok_or_else(|| {
            StreamError::Internal(format!("sequence space exhausted for stream {}", self.name))
        })?;

        let message = Arc::new(Message::new(seq, payload));
        state.history.push(Arc::clone(&message));
        state.next_seq = next_seq;

        let name = &self.name;
        state.sinks.retain(|id, tx| match tx.send(Arc::clone(&message)) {
            Ok(()) => true,
            Err(_) => {
                debug!(stream = %name, sink = id, "Dropping disconnected sink");
                false
            }
        });

        debug!(
            stream = %self.name,
            seq = seq,
            subscribers = state.sinks.len(),
            "Appended to stream"
        );

        Ok(message)
    }

    /// Register a new sink.
    ///
    /// The returned sink first yields every message already in the history,
    /// then every message appended after this call, in sequence order.
    pub fn subscribe(self: &Arc<Self>) -> Sink {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        let id = state.next_sink_id;
        state.next_sink_id += 1;
        let replay: VecDeque<Arc<Message>> = state.history.iter().cloned().collect();
        state.sinks.insert(id, tx);
        let subscribers = state.sinks.len();
        drop(state);

        info!(
            stream = %self.name,
            sink = id,
            replay = replay.len(),
            subscribers = subscribers,
            "Subscriber added"
        );

        Sink::new(Arc::downgrade(self), id, replay, rx)
    }

    /// Remove a sink. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SinkId) -> bool {
        let mut state = self.state.lock();
        let removed = state.sinks.remove(&id).is_some();
        if removed {
            info!(
                stream = %self.name,
                sink = id,
                subscribers = state.sinks.len(),
                "Subscriber removed"
            );
        }
        removed
    }

    /// Drop sinks whose receiver has gone away. Returns how many were removed.
    pub fn reap_closed_sinks(&self) -> usize {
        let mut state = self.state.lock();
        let before = state.sinks.len();
        state.sinks.retain(|_, tx| !tx.is_closed());
        before - state.sinks.len()
    }

    /// Number of messages in the history.
    pub fn len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    /// Copy of the full history.
    pub fn history(&self) -> Vec<Arc<Message>> {
        self.state.lock().history.clone()
    }

    pub fn info(&self) -> StreamInfo {
        let state = self.state.lock();
        StreamInfo {
            name: self.name.clone(),
            messages: state.history.len(),
            subscribers: state.sinks.len(),
            next_seq: state.next_seq,
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").field("name", &self.name).finish()
    }
}
