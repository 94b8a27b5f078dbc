//! Job records, client views and error definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::solver::{OptimizationRequest, SolverError, SolverOutput};
use crate::tolls::TollError;

/// Errors surfaced by the job subsystem.
#[derive(Debug, Error)]
pub enum JobError {
    /// The submission is structurally unusable; no job was created.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("job {0} not found")]
    NotFound(Uuid),

    /// A conditional update found the job in the wrong state.
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error(transparent)]
    SolverFailure(#[from] SolverError),

    #[error("unknown vehicle class '{0}'")]
    UnknownVehicleClass(String),

    /// The solver output does not fit the request it answers.
    #[error("invalid solver output: {0}")]
    InvalidOutput(String),
}

impl From<TollError> for JobError {
    fn from(err: TollError) -> Self {
        match err {
            TollError::UnknownVehicleClass(class) => JobError::UnknownVehicleClass(class),
            other => JobError::InvalidOutput(other.to_string()),
        }
    }
}

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Edges of the lifecycle state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress once a worker has claimed the job.
pub const PROGRESS_CLAIMED: u8 = 10;
/// Progress while the solver is working.
pub const PROGRESS_SOLVING: u8 = 30;
pub const PROGRESS_DONE: u8 = 100;

/// Stored job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationJob {
    pub id: Uuid,
    pub request: OptimizationRequest,
    pub status: JobStatus,
    /// Coarse completion percentage, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    pub result: Option<SolverOutput>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OptimizationJob {
    pub fn new(request: OptimizationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            status: JobStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Seconds spent processing as of `now`.
    ///
    /// Terminal jobs report `completed_at - started_at`; running jobs report
    /// time since start; jobs that never started report nothing.
    pub fn processing_time_seconds(&self, now: DateTime<Utc>) -> Option<f64> {
        let started = self.started_at?;
        let end = match self.status {
            JobStatus::Processing => now,
            _ => self.completed_at?,
        };
        let millis = (end - started).num_milliseconds().max(0);
        Some(millis as f64 / 1000.0)
    }
}

/// What a client sees when polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SolverOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time_seconds: Option<f64>,
}

impl JobView {
    pub fn from_job(job: OptimizationJob, now: DateTime<Utc>) -> Self {
        let processing_time_seconds = job.processing_time_seconds(now);
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            result: job.result,
            error: job.error,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            processing_time_seconds,
        }
    }
}

/// Acknowledgement returned on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&OptimizationJob> for SubmitReceipt {
    fn from(job: &OptimizationJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
        }
    }
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobStats {
    pub fn record(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}
