//! REST API handlers for the scheduler server
//!
//! This module defines the API routes and handlers for the scheduler's
//! HTTP surface: job lifecycle, distribution reporting, and rebalancing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::metrics;
use crate::models::{Job, JobCreateRequest, JobUpdateRequest};
use crate::scheduler::DEFAULT_WINDOW_HOURS;

use super::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub tracked_jobs: usize,
}

/// Query parameters for the distribution endpoint
#[derive(Debug, Deserialize)]
pub struct DistributionParams {
    pub window_hours: Option<u32>,
}

/// Map an engine error onto an HTTP status + body.
fn error_response(err: Error) -> axum::response::Response {
    let status = match &err {
        Error::JobNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::Scheduler(e) if e.is_recoverable() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(ErrorResponse::new(err.to_string()))).into_response()
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/api/health", get(health_check))
        // Scheduler endpoints
        .route("/api/scheduler/distribution", get(get_distribution))
        .route("/api/scheduler/rebalance", post(run_rebalance))
        .route("/api/scheduler/rebalance/preview", post(preview_rebalance))
        // Job lifecycle endpoints
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route(
            "/api/jobs/{id}",
            get(get_job).delete(delete_job).patch(update_job),
        )
        .route("/api/jobs/{id}/pause", post(pause_job))
        .route("/api/jobs/{id}/resume", post(resume_job))
        // Metrics endpoint
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();

    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: uptime,
        tracked_jobs: state.engine.bucket().job_count(),
    }))
}

// ============================================================================
// Scheduler Handlers
// ============================================================================

/// Distribution report over the requested window (default 24h)
async fn get_distribution(
    State(state): State<AppState>,
    Query(params): Query<DistributionParams>,
) -> axum::response::Response {
    let window = params.window_hours.unwrap_or(DEFAULT_WINDOW_HOURS);

    match state.engine.distribution(window).await {
        Ok(report) => Json(ApiResponse::success(report)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Run a full rebalance and persist the resulting moves
async fn run_rebalance(State(state): State<AppState>) -> axum::response::Response {
    match state.engine.rebalance().await {
        Ok(report) => Json(ApiResponse::success(report)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Run the rebalance pass against a copy of the index; nothing moves
async fn preview_rebalance(State(state): State<AppState>) -> axum::response::Response {
    match state.engine.preview_rebalance().await {
        Ok(report) => Json(ApiResponse::success(report)).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Job Handlers
// ============================================================================

/// Create a job and place it in the least-loaded slot
async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<JobCreateRequest>,
) -> axum::response::Response {
    match state.engine.create_job(request).await {
        Ok(job) => (StatusCode::CREATED, Json(ApiResponse::success(job))).into_response(),
        Err(e) => error_response(e),
    }
}

/// List all jobs
async fn list_jobs(State(state): State<AppState>) -> axum::response::Response {
    match state.engine.list_jobs().await {
        Ok(jobs) => Json(ApiResponse::<Vec<Job>>::success(jobs)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Get a specific job
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.engine.get_job(&id).await {
        Ok(Some(job)) => Json(ApiResponse::success(job)).into_response(),
        Ok(None) => error_response(Error::JobNotFound(id)),
        Err(e) => error_response(e),
    }
}

/// Update a job's configuration
async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<JobUpdateRequest>,
) -> axum::response::Response {
    match state.engine.update_job(&id, request).await {
        Ok(job) => Json(ApiResponse::success(job)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Delete a job
async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.engine.delete_job(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(Error::JobNotFound(id)),
        Err(e) => error_response(e),
    }
}

/// Pause a job (its slot assignment stays)
async fn pause_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.engine.pause_job(&id).await {
        Ok(job) => Json(ApiResponse::success(job)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Resume a paused job with a fresh placement
async fn resume_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.engine.resume_job(&id).await {
        Ok(job) => Json(ApiResponse::success(job)).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Metrics Handler
// ============================================================================

/// Prometheus text exposition
async fn get_metrics() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather(),
    )
}

// ============================================================================
// Tests
// ============================================================================
