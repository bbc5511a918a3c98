use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Server address used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9012";

/// One message received from a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Sequence number from the SSE `id` field, when the server sent one
    pub seq: Option<u64>,

    /// The posted document
    pub payload: serde_json::Value,
}

/// Entry of the stream listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub name: String,
    pub messages: usize,
    pub subscribers: usize,
    pub next_seq: u64,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub streams: usize,
}

/// Connection state for readers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,

    /// Connecting to the server
    Connecting,

    /// Successfully connected
    Connected,

    /// Reconnecting after connection loss
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Configuration for talking to an eventcast server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the server
    pub endpoint: String,

    /// Timeout for request/response calls (not applied to SSE)
    pub timeout: Duration,

    /// Whether readers reconnect on connection loss
    pub auto_reconnect: bool,

    /// Delay between reconnection attempts (milliseconds)
    pub reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts (0 = infinite)
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(10),
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: 0, // infinite
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disable auto-reconnection
    pub fn without_auto_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    /// Set the reconnection delay
    pub fn with_reconnect_delay(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set maximum reconnection attempts
    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.max_reconnect_attempts = max;
        self
    }

    /// Build a URL from the endpoint plus percent-encoded path segments.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", self.endpoint, e)))?;
        if segments.is_empty() {
            return Ok(url);
        }
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidEndpoint(self.endpoint.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = ClientConfig::new("http://localhost:9012/");
        assert_eq!(
            config.url(&["orders"]).unwrap().as_str(),
            "http://localhost:9012/orders"
        );
        assert_eq!(
            config.url(&["create", "orders"]).unwrap().as_str(),
            "http://localhost:9012/create/orders"
        );
        assert_eq!(
            config.url(&["a b/c"]).unwrap().as_str(),
            "http://localhost:9012/a%20b%2Fc"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = ClientConfig::new("not a url");
        assert!(matches!(
            config.url(&["orders"]),
            Err(ClientError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("http://example.com")
            .with_timeout(Duration::from_secs(3))
            .without_auto_reconnect()
            .with_reconnect_delay(50)
            .with_max_reconnect_attempts(2);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(!config.auto_reconnect);
        assert_eq!(config.reconnect_delay_ms, 50);
        assert_eq!(config.max_reconnect_attempts, 2);
    }
}
