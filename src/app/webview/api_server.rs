//! HTTP API Server for webview communication
//!
//! Lightweight localhost server in the main process. Webview processes post
//! the terminal message of their preview iframe here; the server hands it to
//! the [`FrameRegistry`], which routes it to the attempt waiting on that frame.
//!
//! # Architecture
//!
//! ```text
//! Webview Process                     Main Process
//! ┌─────────────────────┐            ┌──────────────────────────┐
//! │ iframe postMessage  │            │ API Server               │
//! │   -> host page      │  HTTP POST │ validate token           │
//! │   -> fetch(signal)  ├───────────►│ FrameRegistry::deliver   │
//! └─────────────────────┘            └──────────────────────────┘
//! ```
//!
//! # Security
//!
//! - Random API token generated on server startup
//! - Token passed to webview via environment variable
//! - Each request validated with X-API-Token header
//! - Only the two frame message shapes are accepted

#![warn(clippy::all, rust_2018_idioms)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use super::SignalEndpoint;
use crate::app::sandbox::{Delivery, FrameId, FrameMessage, FrameRegistry};

/// API server configuration and state
pub struct ApiServer {
    /// Random token for authentication
    api_token: String,
    /// Port the server is listening on
    port: u16,
    /// Server shutdown handle
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

/// Shared state passed to all request handlers
#[derive(Clone)]
struct AppState {
    api_token: String,
    registry: Arc<FrameRegistry>,
}

/// Generic API response
#[derive(Debug, Serialize)]
struct ApiResponse {
    /// Success or error
    success: bool,
    /// Response data (JSON) or error message
    data: serde_json::Value,
}

impl ApiServer {
    /// Start the API server on a random available port
    ///
    /// Returns the server instance with port and token for passing to webview
    pub async fn start(registry: Arc<FrameRegistry>) -> anyhow::Result<Arc<RwLock<Self>>> {
        // Generate random API token (32 bytes hex = 64 characters)
        let api_token = generate_api_token();

        info!("Generated API token: {}...", &api_token[..16]);

        let state = AppState {
            api_token: api_token.clone(),
            registry,
        };

        let app = router(state);

        // Bind to localhost on random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let port = addr.port();

        info!("API server listening on http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(e) = result {
                tracing::error!("API server failed: {}", e);
            }
        });

        Ok(Arc::new(RwLock::new(Self {
            api_token,
            port,
            shutdown_tx: Some(shutdown_tx),
        })))
    }

    /// Get the API token for passing to webview
    pub fn token(&self) -> &str {
        &self.api_token
    }

    /// Get the server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the base URL for the API
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn endpoint(&self) -> SignalEndpoint {
        SignalEndpoint {
            base_url: self.base_url(),
            token: self.api_token.clone(),
        }
    }

    /// Shutdown the server
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server shutdown initiated");
        }
    }
}

fn router(state: AppState) -> Router {
    // Webviews load from the wry://localhost origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/api/frames/:frame_id/signal", post(handle_frame_signal))
        .with_state(state)
        .layer(cors)
}

/// Generate a random API token (32 bytes = 64 hex characters)
fn generate_api_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

/// Validate API token from request headers
fn validate_token(headers: &HeaderMap, expected_token: &str) -> bool {
    headers
        .get("X-API-Token")
        .and_then(|v| v.to_str().ok())
        .map(|token| token == expected_token)
        .unwrap_or(false)
}

/// Route: POST /api/frames/{frame_id}/signal
async fn handle_frame_signal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(frame_id): Path<String>,
    Json(message): Json<FrameMessage>,
) -> Response {
    if !validate_token(&headers, &state.api_token) {
        warn!("Unauthorized frame signal: invalid token");
        return (StatusCode::FORBIDDEN, "Invalid API token").into_response();
    }

    let Ok(frame_id) = frame_id.parse::<FrameId>() else {
        warn!("Frame signal for malformed frame id: {}", frame_id);
        return (StatusCode::BAD_REQUEST, "Invalid frame id").into_response();
    };

    match state.registry.deliver(&frame_id, message) {
        Delivery::Delivered => {
            info!("Frame signal delivered: {}", frame_id);
            Json(ApiResponse {
                success: true,
                data: serde_json::json!({ "frameId": frame_id.to_string() }),
            })
            .into_response()
        }
        Delivery::Inactive => {
            info!("Frame signal ignored, frame not active: {}", frame_id);
            (
                StatusCode::GONE,
                Json(ApiResponse {
                    success: false,
                    data: serde_json::json!({ "error": "Frame is not active" }),
                }),
            )
                .into_response()
        }
    }
}
