use crate::config::TokenSource;
use crate::error::TrackerError;
use crate::state::{FusedState, SharedState, TrackingStatus};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The one read endpoint.
pub const API_PATH: &str = "/time";

/// Wire form of the fused state. Numeric fields are zero and status is
/// `waiting` until the first fix arrives.
#[derive(Debug, Serialize, Deserialize)]
pub struct LocationResponse {
    pub latitude: f64,
    pub longitude: f64,
    /// When the current fix was recorded, ms since epoch.
    pub timestamp: i64,
    pub accuracy: f32,
    /// The fused estimator speed, not the satellite-reported one.
    pub speed: f32,
    pub status: TrackingStatus,
    /// The fix's own timestamp, or 0.
    pub location_time: i64,
}

impl LocationResponse {
    fn from_state(state: &FusedState) -> Self {
        let fix = state.last_fix.as_ref();
        LocationResponse {
            latitude: fix.map(|f| f.latitude).unwrap_or(0.0),
            longitude: fix.map(|f| f.longitude).unwrap_or(0.0),
            timestamp: state.acquired_at_ms,
            accuracy: fix.map(|f| f.accuracy).unwrap_or(0.0),
            speed: state.fused_speed_mps,
            status: state.status,
            location_time: fix.map(|f| f.timestamp_ms).unwrap_or(0),
        }
    }
}

#[derive(Clone)]
struct ServerContext {
    state: SharedState,
    tokens: Arc<dyn TokenSource>,
}

/// Read-only HTTP responder for the current fused state, protected by a
/// shared-secret token.
///
/// The token is looked up fresh on every request, so a rotated token takes
/// effect without restarting the server. The server never writes acquisition
/// state.
pub struct DataServer {
    context: ServerContext,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl DataServer {
    pub fn new(state: SharedState, tokens: Arc<dyn TokenSource>) -> Self {
        DataServer {
            context: ServerContext { state, tokens },
            shutdown: None,
            task: None,
            local_addr: None,
        }
    }

    /// Bind the listening socket and start serving. Bind failure is fatal to
    /// startup and surfaces to the caller. No-op when already serving.
    pub async fn start(&mut self, port: u16) -> Result<SocketAddr, TrackerError> {
        if let Some(addr) = self.local_addr {
            return Ok(addr);
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TrackerError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TrackerError::Bind { port, source })?;

        let app = Router::new()
            .fallback(serve_request)
            .with_state(self.context.clone());

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(e) = server.await {
                warn!("data server ended with error: {}", e);
            }
        });

        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
        self.local_addr = Some(local_addr);
        info!("data server listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Release the listening socket. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
            info!("data server stopped");
        }
        self.local_addr = None;
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// Single entry point for every request. The token check runs before any
/// path dispatch, so an unauthorized caller learns nothing, not even which
/// paths exist.
async fn serve_request(
    State(context): State<ServerContext>,
    uri: Uri,
    query: Option<Query<Vec<(String, String)>>>,
) -> Response {
    // First occurrence wins when the parameter is duplicated.
    let token = query.as_ref().and_then(|Query(pairs)| {
        pairs
            .iter()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.clone())
    });

    let valid_token = context.tokens.current_token();
    if token.as_deref() != Some(valid_token.as_str()) {
        warn!("unauthorized access attempt with token: {:?}", token);
        return (StatusCode::UNAUTHORIZED, "Unauthorized: Invalid token").into_response();
    }

    if uri.path() != API_PATH {
        warn!("not found: {}", uri.path());
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }

    let body = LocationResponse::from_state(&context.state.snapshot());
    debug!("sending location data: {:?}", body);
    (
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET"),
        ],
        Json(body),
    )
        .into_response()
}
