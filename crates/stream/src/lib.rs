//! Eventcast Stream Server
//!
//! An in-memory broadcast service for JSON documents: named append-only
//! streams with full history replay and live fan-out over Server-Sent Events.
//!
//! # Features
//!
//! - **Named streams**: Created on demand, plus a reserved `default` stream present from startup
//! - **Replay then live**: A subscriber gets every retained message, then every later append
//! - **Per-subscriber queues**: A slow consumer never blocks a publisher or another consumer
//! - **Ordered delivery**: Each stream assigns sequence numbers; no gaps, no duplicates
//!
//! # Example
//!
//! ```rust,no_run
//! use eventcast_stream::{server, types::ServerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = ServerOptions {
//!         port: 9012,
//!         host: "127.0.0.1".to_string(),
//!         ..Default::default()
//!     };
//!
//!     server::start_server(options).await.unwrap();
//! }
//! ```
//!
//! # Protocol
//!
//! ## Creating a stream
//!
//! ```text
//! POST /create/orders HTTP/1.1
//!
//! Response: 201 Created
//! (409 Conflict if the name is taken, including "default";
//!  400 Bad Request for the reserved name "health")
//! ```
//!
//! ## Appending data
//!
//! ```text
//! POST /orders HTTP/1.1
//! Content-Type: application/json
//!
//! {"event": "order_created", "id": 123}
//!
//! Response: 200 OK
//! {"seq": 0}
//! ```
//!
//! Unknown streams return 404. A body that is not a JSON object returns 400.
//!
//! ## Subscribing
//!
//! ```text
//! GET /orders HTTP/1.1
//! Accept: text/event-stream
//!
//! event: message
//! id: 1760000000000-0
//! data: {"event":"order_created","id":123}
//!
//! : keepalive
//! ```
//!
//! Event ids are `<epoch>-<seq>`, where the epoch is the server's start time
//! in milliseconds. A restarted server numbers from zero under a new epoch.
//!
//! ## Listing and health
//!
//! ```text
//! GET /        -> {"streams": [{"name": "default", "messages": 0, ...}]}
//! GET /health  -> {"status": "healthy", "service": "eventcast", "streams": 1}
//! ```

pub mod error;
pub mod registry;
pub mod server;
pub mod sink;
pub mod stream;
pub mod types;

// Re-export commonly used items
pub use error::StreamError;
pub use registry::StreamRegistry;
pub use server::{AppState, create_router, serve, start_server};
pub use sink::Sink;
pub use stream::Stream;
pub use types::{DEFAULT_STREAM, Message, Payload, ServerOptions, StreamInfo};
