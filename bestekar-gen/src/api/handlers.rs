//! HTTP request handlers
//!
//! Implements the generation job endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use bestekar_common::types::{GenerationRequest, JobSnapshot};

use crate::api::AppState;
use crate::error::Error;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct ActiveJobsResponse {
    pub jobs: Vec<JobSnapshot>,
}

type ApiError = (StatusCode, Json<Value>);

fn map_error(error: Error) -> ApiError {
    let status = match &error {
        Error::TaskNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidDuration(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() })))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/generate - submit a generation request
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    info!(
        "Generation request: mode={}, duration={}s",
        request.mode, request.duration_secs
    );
    let job_id = state.manager.submit(request).await.map_err(map_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            state: "PENDING".to_string(),
        }),
    ))
}

/// GET /api/v1/generate/:job_id - poll a job snapshot
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, ApiError> {
    state
        .manager
        .poll(job_id)
        .await
        .map(Json)
        .map_err(map_error)
}

/// POST /api/v1/generate/:job_id/cancel - cancel a job
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, ApiError> {
    info!("Cancel requested for job {}", job_id);
    state
        .manager
        .cancel(job_id)
        .await
        .map(Json)
        .map_err(map_error)
}

/// GET /api/v1/generate/active - list PENDING and PROGRESS jobs
pub async fn list_active(State(state): State<AppState>) -> Json<ActiveJobsResponse> {
    let jobs = state.manager.list_active().await;
    Json(ActiveJobsResponse { jobs })
}
