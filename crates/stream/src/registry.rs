//! Process-wide mapping from stream name to stream.
//!
//! The map has its own lock, separate from each stream's lock. Lookups take
//! only a read lock and release it before any per-stream operation, so
//! traffic on one stream never waits on another.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    error::StreamError,
    sink::Sink,
    stream::Stream,
    types::{DEFAULT_STREAM, Message, Payload, StreamInfo},
};

/// Registry of all streams, owned by the server and shared by handle.
pub struct StreamRegistry {
    /// Streams indexed by name
    streams: RwLock<HashMap<String, Arc<Stream>>>,
    /// Name of the reserved stream created at construction
    default_stream: String,
    /// Construction time in milliseconds, distinguishing this history from
    /// that of an earlier process
    epoch: u64,
}

impl StreamRegistry {
    /// Create a registry holding only the reserved `default` stream.
    pub fn new() -> Arc<Self> {
        Self::with_default_stream(DEFAULT_STREAM)
    }

    /// Create a registry whose reserved stream has a custom name.
    pub fn with_default_stream(name: impl Into<String>) -> Arc<Self> {
        let default_stream = name.into();
        let mut streams = HashMap::new();
        streams.insert(default_stream.clone(), Stream::new(default_stream.clone()));

        Arc::new(Self {
            streams: RwLock::new(streams),
            default_stream,
            epoch: Utc::now().timestamp_millis().max(0) as u64,
        })
    }

    /// Identifier of this registry instance. Sequence numbers restart from
    /// zero under a new epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Name of the reserved stream.
    pub fn default_stream(&self) -> &str {
        &self.default_stream
    }

    /// Create a new stream. Fails with `Conflict` if the name is taken.
    pub fn create(&self, name: &str) -> Result<Arc<Stream>, StreamError> {
        let mut streams = self.streams.write();

        if streams.contains_key(name) {
            return Err(StreamError::Conflict(name.to_string()));
        }

        let stream = Stream::new(name);
        streams.insert(name.to_string(), Arc::clone(&stream));
        info!(stream = %name, "Created stream");

        Ok(stream)
    }

    /// Look up a stream by name.
    pub fn get(&self, name: &str) -> Result<Arc<Stream>, StreamError> {
        self.streams
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StreamError::NotFound(name.to_string()))
    }

    /// Check if a stream exists.
    pub fn has(&self, name: &str) -> bool {
        self.streams.read().contains_key(name)
    }

    /// Append a payload to the named stream.
    pub fn append(&self, name: &str, payload: Payload) -> Result<Arc<Message>, StreamError> {
        self.get(name)?.append(payload)
    }

    /// Subscribe to the named stream.
    pub fn subscribe(&self, name: &str) -> Result<Sink, StreamError> {
        Ok(self.get(name)?.subscribe())
    }

    /// Snapshot of every stream, sorted by name.
    pub fn list(&self) -> Vec<StreamInfo> {
        let streams: Vec<Arc<Stream>> = self.streams.read().values().cloned().collect();
        let mut infos: Vec<StreamInfo> = streams.iter().map(|s| s.info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Number of streams, including the reserved one.
    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep dead sinks from every stream. Returns the total removed.
    pub fn reap(&self) -> usize {
        let streams: Vec<Arc<Stream>> = self.streams.read().values().cloned().collect();
        let removed: usize = streams.iter().map(|s| s.reap_closed_sinks()).sum();

        if removed > 0 {
            info!(removed = removed, "Reaped disconnected sinks");
        } else {
            debug!("No disconnected sinks to reap");
        }
        removed
    }

    /// Spawn a background task that calls [`reap`](Self::reap) on an interval.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match registry.upgrade() {
                    Some(registry) => {
                        registry.reap();
                    }
                    None => break,
                }
            }
        })
    }
}
