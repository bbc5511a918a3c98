//! Per-subscriber delivery channel.

use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll},
};

use tokio::sync::mpsc;

use crate::{stream::Stream, types::Message};

/// Identifier of a sink within its stream.
pub type SinkId = u64;

/// One consumer's view of a stream.
///
/// Yields the history captured at subscribe time, then every later append in
/// order. It only ends when the owning stream is dropped. Dropping the sink
/// deregisters it from the stream.
pub struct Sink {
    stream: Weak<Stream>,
    id: SinkId,
    cursor: u64,
    replay: VecDeque<Arc<Message>>,
    rx: mpsc::UnboundedReceiver<Arc<Message>>,
}

impl Sink {
    pub(crate) fn new(
        stream: Weak<Stream>,
        id: SinkId,
        replay: VecDeque<Arc<Message>>,
        rx: mpsc::UnboundedReceiver<Arc<Message>>,
    ) -> Self {
        Self {
            stream,
            id,
            cursor: replay.len() as u64,
            replay,
            rx,
        }
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    /// History length observed at subscribe time; the first live message
    /// carries this sequence number.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Replay messages not yet yielded.
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    /// The owning stream, if it still exists.
    pub fn stream(&self) -> Option<Arc<Stream>> {
        self.stream.upgrade()
    }

    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        if let Some(message) = self.replay.pop_front() {
            return Some(message);
        }
        self.rx.recv().await
    }

    /// Detach the raw receiver without deregistering, leaving the sender
    /// registered until a sweep or a failed send notices.
    #[cfg(test)]
    pub(crate) fn into_receiver(mut self) -> mpsc::UnboundedReceiver<Arc<Message>> {
        self.stream = Weak::new();
        let (_, placeholder) = mpsc::unbounded_channel();
        std::mem::replace(&mut self.rx, placeholder)
    }
}

impl futures::Stream for Sink {
    type Item = Arc<Message>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(message) = this.replay.pop_front() {
            return Poll::Ready(Some(message));
        }
        this.rx.poll_recv(cx)
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.upgrade() {
            stream.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.id)
            .field("cursor", &self.cursor)
            .field("pending_replay", &self.replay.len())
            .finish()
    }
}
