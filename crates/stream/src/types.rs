//! Core types for the event broadcast server.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Name of the stream that exists from startup without an explicit create.
pub const DEFAULT_STREAM: &str = "default";

/// Opaque, case-sensitive stream identifier.
pub type StreamName = String;

/// A posted JSON document. Only objects are accepted.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A message stored in a stream's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Position in the stream, starting at 0 and increasing by one per append
    pub seq: u64,
    /// The document exactly as it was posted (structurally)
    pub payload: Payload,
    /// Timestamp when the message was appended (milliseconds since epoch)
    pub timestamp: i64,
}

impl Message {
    pub fn new(seq: u64, payload: Payload) -> Self {
        Self {
            seq,
            payload,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Serialize the payload for the wire.
    pub fn payload_json(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_default()
    }
}

/// Point-in-time view of a stream, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: StreamName,
    /// Number of messages in the history
    pub messages: usize,
    /// Number of currently registered sinks
    pub subscribers: usize,
    pub next_seq: u64,
}

/// Server configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Port to listen on (0 for auto-assign)
    pub port: u16,
    /// Host to bind to
    pub host: String,
    /// Reserved stream created at startup
    pub default_stream: String,
    /// Interval between SSE keep-alive comments, in seconds
    pub keep_alive_secs: u64,
    /// Interval between dead-sink sweeps, in seconds (0 disables the sweeper)
    pub reap_interval_secs: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: 9012,
            host: "127.0.0.1".to_string(),
            default_stream: DEFAULT_STREAM.to_string(),
            keep_alive_secs: 15,
            reap_interval_secs: 30,
        }
    }
}

impl ServerOptions {
    /// `host:port` as passed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a request body into a payload.
///
/// Returns `None` when the body is not valid JSON or not a JSON object.
pub fn parse_payload(body: &[u8]) -> Option<Payload> {
    match serde_json::from_slice::<serde_json::Value>(body).ok()? {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_payload_object() {
        let payload = parse_payload(br#"{"id": 1, "tags": ["a", "b"]}"#).unwrap();
        assert_eq!(payload.get("id"), Some(&json!(1)));
        assert_eq!(payload.get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_parse_payload_rejects_non_objects() {
        assert_eq!(parse_payload(b"[1, 2]"), None);
        assert_eq!(parse_payload(b"42"), None);
        assert_eq!(parse_payload(b"\"text\""), None);
        assert_eq!(parse_payload(b"{not json"), None);
        assert_eq!(parse_payload(b""), None);
    }

    #[test]
    fn test_payload_json_is_structurally_equal() {
        let payload = parse_payload(br#"{"name": "x", "nested": {"k": [1, null, true]}}"#).unwrap();
        let message = Message::new(0, payload.clone());

        let reparsed: serde_json::Value = serde_json::from_str(&message.payload_json()).unwrap();
        assert_eq!(reparsed, serde_json::Value::Object(payload));
    }

    #[test]
    fn test_default_options() {
        let options = ServerOptions::default();
        assert_eq!(options.default_stream, DEFAULT_STREAM);
        assert_eq!(options.bind_addr(), "127.0.0.1:9012");
    }
}
