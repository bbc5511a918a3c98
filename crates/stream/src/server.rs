//! HTTP server exposing the stream registry.

use std::{convert::Infallible, future::Future, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{
        IntoResponse, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::json;
use tokio::{net::TcpListener, sync::watch};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::{
    error::StreamError,
    registry::StreamRegistry,
    sink::Sink,
    types::{Message, ServerOptions, parse_payload},
};

/// Names served by fixed routes, which a stream could never be reached under.
pub const RESERVED_NAMES: &[&str] = &["health"];

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StreamRegistry>,
    pub options: ServerOptions,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Build state with a fresh registry seeded with the configured default stream.
    pub fn new(options: ServerOptions) -> Self {
        let registry = StreamRegistry::with_default_stream(options.default_stream.clone());
        Self::with_registry(registry, options)
    }

    pub fn with_registry(registry: Arc<StreamRegistry>, options: ServerOptions) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            registry,
            options,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// End every open event stream.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

/// Response body for a successful append.
#[derive(Debug, Serialize)]
pub struct AppendResponse {
    pub seq: u64,
}

/// Create the router with all stream endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/", get(handle_list))
        .route("/create/{name}", post(handle_create))
        .route("/{name}", get(handle_subscribe).post(handle_append))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// GET /health - liveness check
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "eventcast",
        "streams": state.registry.len(),
    }))
}

/// GET / - list streams
async fn handle_list(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "streams": state.registry.list() }))
}

/// POST /create/{name} - create a new stream
async fn handle_create(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, StreamError> {
    if RESERVED_NAMES.contains(&name.as_str()) {
        return Err(StreamError::BadRequest(format!(
            "stream name {} is reserved",
            name
        )));
    }
    state.registry.create(&name)?;
    Ok(StatusCode::CREATED)
}

/// POST /{name} - append a JSON object to a stream
async fn handle_append(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<AppendResponse>, StreamError> {
    // An unknown stream wins over a malformed body.
    let stream = state.registry.get(&name)?;

    let payload = parse_payload(&body)
        .ok_or_else(|| StreamError::BadRequest("body must be a JSON object".to_string()))?;

    let message = stream.append(payload)?;
    Ok(Json(AppendResponse { seq: message.seq }))
}

/// GET /{name} - replay history then follow live appends over SSE
async fn handle_subscribe(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, StreamError> {
    let sink = state.registry.subscribe(&name)?;
    debug!(stream = %name, sink = sink.id(), replay = sink.pending_replay(), "Opening event stream");

    let events = create_sse_stream(sink, state.registry.epoch(), state.shutdown_rx());
    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.options.keep_alive_secs.max(1)))
            .text("keepalive"),
    ))
}

/// SSE event for a message. The id is `<epoch>-<seq>`.
fn message_event(epoch: u64, message: &Message) -> Event {
    Event::default()
        .event("message")
        .id(format!("{}-{}", epoch, message.seq))
        .data(message.payload_json())
}

/// Resolves once shutdown is signalled. A dropped sender is not a shutdown.
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn create_sse_stream(
    mut sink: Sink,
    epoch: u64,
    shutdown: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let shutdown = wait_for_shutdown(shutdown);
        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                message = sink.recv() => message,
                _ = &mut shutdown => None,
            };

            match next {
                Some(message) => yield Ok(message_event(epoch, &message)),
                None => break,
            }
        }
        // `sink` drops here and deregisters itself.
    }
}

/// Serve on an already bound listener until `signal` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let reaper = (state.options.reap_interval_secs > 0).then(|| {
        state
            .registry
            .spawn_reaper(Duration::from_secs(state.options.reap_interval_secs))
    });

    let shutdown_state = state.clone();
    let router = create_router(state);

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            info!("Shutdown requested, closing event streams");
            shutdown_state.shutdown();
        })
        .await;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    result
}

/// Start the server and run until Ctrl-C.
pub async fn start_server(options: ServerOptions) -> std::io::Result<()> {
    let state = AppState::new(options.clone());

    let addr = options.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        addr = %listener.local_addr()?,
        default_stream = %options.default_stream,
        "Starting eventcast server"
    );

    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, BodyDataStream},
        http::Request,
    };
    use futures::StreamExt;
    use serde_json::Value;
    use tokio::time::timeout;
    use tower::ServiceExt;

    use super::*;

    fn create_test_state() -> AppState {
        AppState::new(ServerOptions::default())
    }

    fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Read the next `data:` payload from an SSE body, skipping keep-alives.
    async fn next_data(body: &mut BodyDataStream, buf: &mut String) -> Value {
        loop {
            if let Some(pos) = buf.find("\n\n") {
                let frame: String = buf.drain(..pos + 2).collect();
                if let Some(data) = frame.lines().find_map(|l| l.strip_prefix("data:")) {
                    return serde_json::from_str(data.trim_start()).unwrap();
                }
                continue;
            }
            let chunk = timeout(Duration::from_secs(2), body.next())
                .await
                .expect("timed out waiting for event")
                .expect("event stream ended")
                .unwrap();
            buf.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(create_test_state());

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["streams"], 1);
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let app = create_router(create_test_state());

        let response = app
            .clone()
            .oneshot(post("/create/pytest-stream", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(post("/create/pytest-stream", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("pytest-stream"));
    }

    #[tokio::test]
    async fn test_post_to_unknown_stream() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(post("/invalid-stream-handling", r#"{"name": "x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_to_unknown_stream_with_bad_body() {
        let app = create_router(create_test_state());

        let response = app.oneshot(post("/nope", "not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_rejects_non_object() {
        let state = create_test_state();
        let app = create_router(state.clone());

        let response = app.clone().oneshot(post("/default", "[1, 2]")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(post("/default", "{broken")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(state.registry.get("default").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_to_default_stream() {
        let state = create_test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(post("/default", r#"{"trial_id": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["seq"], 0);

        let response = app
            .oneshot(post("/default", r#"{"trial_id": 2}"#))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["seq"], 1);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_stream() {
        let app = create_router(create_test_state());

        let response = app.oneshot(get("/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_subscribe_replays_history_then_live() {
        let state = create_test_state();
        let app = create_router(state.clone());

        app.clone()
            .oneshot(post("/create/orders", Body::empty()))
            .await
            .unwrap();
        for id in [1, 2] {
            let response = app
                .clone()
                .oneshot(post("/orders", format!(r#"{{"id": {id}}}"#)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(get("/orders")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let mut body = response.into_body().into_data_stream();
        let mut buf = String::new();
        assert_eq!(next_data(&mut body, &mut buf).await, json!({"id": 1}));
        assert_eq!(next_data(&mut body, &mut buf).await, json!({"id": 2}));

        app.oneshot(post("/orders", r#"{"id": 3}"#)).await.unwrap();
        assert_eq!(next_data(&mut body, &mut buf).await, json!({"id": 3}));
    }

    #[tokio::test]
    async fn test_two_subscribers_receive_post() {
        let state = create_test_state();
        let app = create_router(state.clone());

        app.clone()
            .oneshot(post("/create/concurrent-subscriptions", Body::empty()))
            .await
            .unwrap();

        let first = app
            .clone()
            .oneshot(get("/concurrent-subscriptions"))
            .await
            .unwrap();
        let second = app
            .clone()
            .oneshot(get("/concurrent-subscriptions"))
            .await
            .unwrap();
        let stream = state.registry.get("concurrent-subscriptions").unwrap();
        assert_eq!(stream.subscriber_count(), 2);

        let data = json!({"name": "Ada", "email": "ada@example.com"});
        app.oneshot(post("/concurrent-subscriptions", data.to_string()))
            .await
            .unwrap();

        let mut first = first.into_body().into_data_stream();
        let mut second = second.into_body().into_data_stream();
        let (mut buf1, mut buf2) = (String::new(), String::new());
        assert_eq!(next_data(&mut first, &mut buf1).await, data);
        assert_eq!(next_data(&mut second, &mut buf2).await, data);
    }

    #[tokio::test]
    async fn test_dropping_event_stream_unsubscribes() {
        let state = create_test_state();
        let app = create_router(state.clone());

        let response = app.oneshot(get("/default")).await.unwrap();
        let stream = state.registry.get("default").unwrap();
        assert_eq!(stream.subscriber_count(), 1);

        drop(response);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_event_streams() {
        let state = create_test_state();
        let app = create_router(state.clone());

        let response = app.oneshot(get("/default")).await.unwrap();
        let mut body = response.into_body().into_data_stream();

        state.shutdown();

        let end = timeout(Duration::from_secs(2), async {
            while let Some(chunk) = body.next().await {
                chunk.unwrap();
            }
        })
        .await;
        assert!(end.is_ok(), "event stream did not end on shutdown");
        assert_eq!(state.registry.get("default").unwrap().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_list_streams() {
        let state = create_test_state();
        let app = create_router(state.clone());

        app.clone()
            .oneshot(post("/create/orders", Body::empty()))
            .await
            .unwrap();

        let response = app.oneshot(get("/")).await.unwrap();
        let body = json_body(response).await;
        let names: Vec<&str> = body["streams"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["default", "orders"]);
    }

    #[tokio::test]
    async fn test_event_ids_carry_epoch_and_sequence() {
        let state = create_test_state();
        let app = create_router(state.clone());
        app.clone()
            .oneshot(post("/default", r#"{"id": 1}"#))
            .await
            .unwrap();

        let response = app.oneshot(get("/default")).await.unwrap();
        let mut body = response.into_body().into_data_stream();
        let chunk = timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = std::str::from_utf8(&chunk).unwrap();

        let id = frame
            .lines()
            .find_map(|l| l.strip_prefix("id:"))
            .map(str::trim_start)
            .unwrap();
        assert_eq!(id, format!("{}-0", state.registry.epoch()));
        assert!(frame.contains("event: message") || frame.contains("event:message"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_comments_are_sent() {
        let options = ServerOptions {
            keep_alive_secs: 1,
            ..Default::default()
        };
        let app = create_router(AppState::new(options));

        let response = app.oneshot(get("/default")).await.unwrap();
        let mut body = response.into_body().into_data_stream();
        let chunk = timeout(Duration::from_secs(5), body.next())
            .await
            .expect("no keep-alive sent")
            .unwrap()
            .unwrap();
        assert!(std::str::from_utf8(&chunk).unwrap().starts_with(":"));
    }

    #[tokio::test]
    async fn test_event_stream_outlives_dropped_router() {
        let registry = StreamRegistry::new();
        let app = create_router(AppState::with_registry(
            Arc::clone(&registry),
            ServerOptions::default(),
        ));

        // `oneshot` consumes the router and with it every `AppState` clone.
        let response = app.oneshot(get("/default")).await.unwrap();
        let mut body = response.into_body().into_data_stream();
        let mut buf = String::new();

        registry
            .append("default", parse_payload(br#"{"id": 1}"#).unwrap())
            .unwrap();
        assert_eq!(next_data(&mut body, &mut buf).await, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_reserved_names_cannot_be_created() {
        let state = create_test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(post("/create/health", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!state.registry.has("health"));

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(json_body(response).await["status"], "healthy");
    }
}
