//! HTTP API
//!
//! - `GET /health`, `GET /api/v1/health` - liveness and version
//! - `POST /api/v1/upload` - store a video, returns its key
//! - `POST /api/v1/uploads/presign` - URL for a direct upload to storage
//! - `POST /api/v1/process` - process an uploaded video (multipart)
//! - `POST /api/v1/process/key` - process a video already in storage

pub mod error;
pub mod handlers;
pub mod logging;
pub mod schemas;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::pipeline::ProcessVideo;

pub use error::ApiError;

/// Room for multipart headers and small form fields on top of the file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub process_video: Arc<ProcessVideo>,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(process_video: Arc<ProcessVideo>, max_upload_bytes: u64) -> Self {
        Self {
            process_video,
            max_upload_bytes,
        }
    }

    /// Lifetime of URLs handed to clients
    #[must_use]
    pub fn url_expiry(&self) -> Duration {
        Duration::from_secs(self.process_video.config().url_expiry_secs)
    }
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/upload", post(handlers::upload))
        .route("/api/v1/uploads/presign", post(handlers::presign_upload))
        .route("/api/v1/process", post(handlers::process_upload))
        .route("/api/v1/process/key", post(handlers::process_key))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(logging::log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
