//! REST API for the generation service
//!
//! The submission and status boundary consumed by the desktop client:
//! submit a request, poll its job, cancel it, list active jobs, or
//! subscribe to the SSE event stream.

pub mod handlers;
pub mod sse;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::tasks::{JobStore, TaskManager};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Task manager
    pub manager: Arc<TaskManager>,
    /// Job snapshot store (for SSE subscriptions)
    pub store: Arc<JobStore>,
    /// Music output folder
    pub music_folder: String,
    /// Server port
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))

        // API v1 routes
        .nest("/api/v1", Router::new()
            // Generation job endpoints
            .route("/generate", post(handlers::submit))
            .route("/generate/active", get(handlers::list_active))
            .route("/generate/:job_id", get(handlers::get_job))
            .route("/generate/:job_id/cancel", post(handlers::cancel_job))

            // SSE events
            .route("/events", get(sse::event_stream))
        )
        // Desktop client runs on a different origin during development
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "bestekar-gen",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
        "music_folder": state.music_folder
    }))
}
