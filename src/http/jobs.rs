//! Job API handlers.
//!
//! | Method | Path | Result |
//! |---|---|---|
//! | POST | `/optimize/jobs` | 202 `{jobId, status, createdAt}` |
//! | GET | `/optimize/jobs` | per-status counts |
//! | GET | `/optimize/jobs/{id}` | job view |
//! | DELETE | `/optimize/jobs/{id}` | cancel, job view |
//! | POST | `/optimize/jobs/{id}/process` | execute inline, job view |
//! | GET | `/health` | liveness |

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::http::server::AppState;
use crate::jobs::{ExecuteOutcome, JobError, JobStats, JobView, SubmitReceipt};
use crate::solver::OptimizationRequest;

/// Error response body: `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let status = match &err {
            JobError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::InvalidTransition { .. } => StatusCode::CONFLICT,
            JobError::SolverFailure(_) => StatusCode::BAD_GATEWAY,
            JobError::UnknownVehicleClass(_) => StatusCode::UNPROCESSABLE_ENTITY,
            JobError::InvalidOutput(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, format!("invalid request: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = %self.status, error = %self.message, "Request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid job id '{raw}'")))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn submit_job(
    State(state): State<AppState>,
    payload: Result<Json<OptimizationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitReceipt>), ApiError> {
    let Json(request) = payload?;
    let receipt = state.controller.submit(request)?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

pub async fn poll_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.controller.poll(id)?))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.controller.cancel(id)?))
}

/// Run a pending job to completion and answer with its final state.
///
/// Execution runs on its own task so a timed-out or disconnected request
/// does not abandon the job mid-flight.
pub async fn process_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let id = parse_job_id(&id)?;
    let controller = state.controller.clone();
    let execution = tokio::spawn(async move { controller.execute(id).await });
    let outcome = execution.await.map_err(|e| {
        tracing::error!(job_id = %id, error = %e, "Job execution task failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "job execution aborted")
    })??;

    match outcome {
        ExecuteOutcome::NotClaimed => {
            let view = state.controller.poll(id)?;
            Err(ApiError::new(
                StatusCode::CONFLICT,
                format!("job {} is {} and cannot be processed", id, view.status),
            ))
        }
        _ => Ok(Json(state.controller.poll(id)?)),
    }
}

pub async fn job_stats(State(state): State<AppState>) -> Json<JobStats> {
    Json(state.controller.stats())
}
