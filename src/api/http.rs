use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::listener::{ListenerState, ListenerStatus, Shutdown};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to bind to {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("Server error: {0}")]
    Server(String),
}

/// Response structure for health endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub listener_state: ListenerState,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub status: watch::Receiver<ListenerStatus>,
}

/// Read-only HTTP view of the running listener
pub struct StatusServer {
    status: watch::Receiver<ListenerStatus>,
    host: String,
    port: u16,
}

impl StatusServer {
    pub fn new(status: watch::Receiver<ListenerStatus>, config: &ApiConfig) -> Self {
        Self {
            status,
            host: config.host.clone(),
            port: config.port,
        }
    }

    /// Serve until `shutdown` is triggered
    pub async fn start(self, shutdown: Shutdown) -> Result<(), ApiError> {
        let app = router(self.status);

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| ApiError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

        log::info!("Status API listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .map_err(|e| ApiError::Server(e.to_string()))?;

        Ok(())
    }
}

pub fn router(status: watch::Receiver<ListenerStatus>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/status", get(get_status))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(AppState { status })
}

/// GET /health - liveness of the process
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let listener_state = state.status.borrow().state;
    Json(HealthResponse {
        status: "ok".to_string(),
        listener_state,
    })
}

/// GET /status - latest listener snapshot
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<ListenerStatus>, (StatusCode, Json<ErrorResponse>)> {
    if state.status.has_changed().is_err() {
        log::error!("Status channel closed; listener is no longer running");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "listener_stopped".to_string(),
                message: "The listener task has exited".to_string(),
            }),
        ));
    }

    let snapshot = state.status.borrow().clone();
    Ok(Json(snapshot))
}
