//! Eventcast SDK
//!
//! Client-side access to an eventcast server: publish JSON documents to named
//! streams and follow them over Server-Sent Events.
//!
//! # Overview
//!
//! - [`Publisher`] - Create streams, post documents, list streams, check health
//! - [`EventReader`] - Follow a stream (history replay, then live) with auto-reconnect
//! - [`mock`] - Synthetic trial data producer for demos and load
//!
//! # Quick Start
//!
//! ## Publishing
//!
//! ```ignore
//! use eventcast_sdk::{ClientConfig, Publisher};
//!
//! let publisher = Publisher::new(ClientConfig::new("http://localhost:9012"))?;
//! publisher.create_stream("orders").await?;
//! let seq = publisher.post("orders", &serde_json::json!({"id": 1})).await?;
//! ```
//!
//! ## Subscribing to a Stream
//!
//! ```ignore
//! use eventcast_sdk::{ClientConfig, EventReader};
//!
//! let mut reader = EventReader::new("orders", ClientConfig::new("http://localhost:9012"));
//! let mut rx = reader.subscribe();
//! reader.connect().await?;
//!
//! while let Some(event) = rx.recv().await {
//!     println!("#{:?}: {}", event.seq, event.payload);
//! }
//! ```

pub mod error;
pub mod mock;
pub mod publisher;
pub mod reader;
pub mod types;

// Re-export main types at crate root
pub use error::{ClientError, Result};
pub use publisher::Publisher;
pub use reader::EventReader;
pub use types::{
    ClientConfig, ConnectionState, DEFAULT_ENDPOINT, HealthStatus, StreamEvent, StreamSummary,
};
