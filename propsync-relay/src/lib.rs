//! Notification relay for propsync clients.
//!
//! Serves a server-sent event stream at `GET /api/events` and rebroadcasts
//! whatever is posted to `POST /api/events/trigger` to every open stream.
//! Each stream starts with a `connection` greeting. An optional
//! [simulator](run_simulator) publishes price changes read from a JSON
//! database file.

mod simulator;

pub use simulator::{SimulatorConfig, load_properties, run_simulator, simulate_once, simulated_update};

use axum::{
    Router,
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
    },
    middleware,
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt, stream};
use propsync_types::{EventKind, WireEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

/// Message carried by the greeting each stream opens with.
pub const CONNECTED_MESSAGE: &str = "Connected to real-time updates";

/// Messages a slow client may fall behind by before it starts skipping.
pub const DEFAULT_CAPACITY: usize = 256;

/// Shared relay state: the fan-out channel and the start time.
#[derive(Clone, Debug)]
pub struct RelayState {
    events: broadcast::Sender<String>,
    started: Arc<Instant>,
}

impl RelayState {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            events,
            started: Arc::new(Instant::now()),
        }
    }

    /// Sends an already-encoded message to every open stream. Returns the
    /// number of streams it reached.
    pub fn broadcast(&self, payload: String) -> usize {
        self.events.send(payload).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    /// Number of streams currently open.
    pub fn client_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ── Wire bodies ─────────────────────────────────────────────────

/// Body of a manual trigger. Both fields are required; they stay optional
/// here so a missing one answers 400 with a readable error.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TriggerRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub property: Option<Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub connected_clients: usize,
    pub uptime: f64,
}

// ── Handlers ────────────────────────────────────────────────────

async fn events_handler(State(state): State<RelayState>) -> impl IntoResponse {
    let receiver = state.subscribe();
    info!(clients = state.client_count(), "client connected to event stream");

    (
        [(ACCESS_CONTROL_ALLOW_HEADERS, "Cache-Control")],
        Sse::new(event_stream(receiver)).keep_alive(KeepAlive::default()),
    )
}

fn event_stream(
    receiver: broadcast::Receiver<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::once(async { greeting() })
        .chain(stream::unfold(receiver, next_message))
        .map(|data| Ok(Event::default().data(data)))
}

fn greeting() -> String {
    json!({
        "type": EventKind::Connection.as_str(),
        "message": CONNECTED_MESSAGE,
    })
    .to_string()
}

async fn next_message(
    mut receiver: broadcast::Receiver<String>,
) -> Option<(String, broadcast::Receiver<String>)> {
    loop {
        match receiver.recv().await {
            Ok(message) => return Some((message, receiver)),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "client fell behind, skipping messages");
            }
            Err(RecvError::Closed) => {
                debug!("event channel closed");
                return None;
            }
        }
    }
}

async fn trigger_handler(
    State(state): State<RelayState>,
    Json(request): Json<TriggerRequest>,
) -> Response {
    let kind = request.kind.filter(|k| !k.is_empty());
    let (Some(kind), Some(property)) = (kind, request.property) else {
        warn!("trigger rejected: missing type or property");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing type or property data".to_string(),
            }),
        )
            .into_response();
    };

    let name = property
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let envelope = WireEnvelope {
        kind,
        property: Some(property),
        message: None,
    };
    let payload = match serde_json::to_string(&envelope) {
        Ok(payload) => payload,
        Err(e) => {
            error!("failed to encode triggered event: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let clients = state.broadcast(payload);
    info!(kind = %envelope.kind, %name, clients, "manual trigger broadcast");

    Json(TriggerResponse {
        success: true,
        message: "Event broadcasted".to_string(),
    })
    .into_response()
}

async fn preflight_handler() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Cache-Control"),
        ],
    )
}

async fn health_handler(State(state): State<RelayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        connected_clients: state.client_count(),
        uptime: state.uptime_secs(),
    })
}

async fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Build the relay router over the given state.
pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/events", get(events_handler))
        .route(
            "/api/events/trigger",
            post(trigger_handler).options(preflight_handler),
        )
        .route("/health", get(health_handler))
        .layer(middleware::map_response(allow_any_origin))
        .with_state(state)
}
