//! Job storage and snapshot persistence.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::jobs::types::{
    JobError, JobResult, JobStats, JobStatus, OptimizationJob, PROGRESS_CLAIMED, PROGRESS_DONE,
};
use crate::solver::{OptimizationRequest, SolverOutput};

/// Message recorded on jobs that were mid-flight when the service stopped.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by service restart";

/// Durable record of optimization jobs.
///
/// Every mutation is a compare-and-set on the job's current status; a
/// mismatch fails with `InvalidTransition` and leaves the record untouched.
pub trait JobStore: Send + Sync {
    /// Insert a new pending job.
    fn create(&self, request: OptimizationRequest) -> OptimizationJob;

    fn get(&self, id: Uuid) -> JobResult<OptimizationJob>;

    /// pending → processing; sets `started_at`.
    fn mark_processing(&self, id: Uuid) -> JobResult<OptimizationJob>;

    /// Raise the progress of a processing job.
    ///
    /// Returns `false` without touching the record when the job is not
    /// processing or already further along.
    fn record_progress(&self, id: Uuid, progress: u8) -> JobResult<bool>;

    /// processing → completed; sets `result` and `completed_at`.
    fn mark_completed(&self, id: Uuid, result: SolverOutput) -> JobResult<OptimizationJob>;

    /// pending | processing → failed; sets `error` and `completed_at`.
    fn mark_failed(&self, id: Uuid, message: String) -> JobResult<OptimizationJob>;

    fn count(&self) -> usize;

    fn stats(&self) -> JobStats;

    /// Pending job ids, oldest first.
    fn pending_ids(&self) -> Vec<Uuid>;
}

/// DashMap-backed store with an optional JSON snapshot file.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    inner: Arc<DashMap<Uuid, OptimizationJob>>,
    persistence_path: Option<PathBuf>,
}

impl InMemoryJobStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Open a store backed by `path`, loading the snapshot if it exists.
    ///
    /// Jobs that were processing when the snapshot was written are failed,
    /// since their execution did not survive the restart.
    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if !path.exists() {
            return Ok(store);
        }

        let reader = BufReader::new(File::open(path)?);
        let jobs: HashMap<Uuid, OptimizationJob> = serde_json::from_reader(reader)?;

        let mut interrupted = 0usize;
        for (id, mut job) in jobs {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Failed;
                job.error = Some(INTERRUPTED_MESSAGE.to_string());
                job.completed_at = Some(Utc::now());
                interrupted += 1;
            }
            store.inner.insert(id, job);
        }

        tracing::info!(
            path = %path.display(),
            jobs = store.inner.len(),
            interrupted,
            "Loaded job snapshot"
        );
        Ok(store)
    }

    /// Write every job to the snapshot file, if one is configured.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let jobs: HashMap<Uuid, OptimizationJob> = self
            .inner
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();

        // Write beside the target and rename so a crash never leaves half a file.
        let staging = path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&staging)?);
            serde_json::to_writer(writer, &jobs)?;
        }
        fs::rename(&staging, path)?;

        tracing::info!(path = %path.display(), jobs = jobs.len(), "Saved job snapshot");
        Ok(())
    }

    pub fn persistence_path(&self) -> Option<&Path> {
        self.persistence_path.as_deref()
    }

    /// Apply `update` if the job may move to `next`.
    fn transition<F>(&self, id: Uuid, next: JobStatus, update: F) -> JobResult<OptimizationJob>
    where
        F: FnOnce(&mut OptimizationJob),
    {
        let mut entry = self.inner.get_mut(&id).ok_or(JobError::NotFound(id))?;
        let current = entry.status;
        if !current.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id,
                from: current,
                to: next,
            });
        }
        let job = entry.value_mut();
        job.status = next;
        update(job);
        Ok(job.clone())
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, request: OptimizationRequest) -> OptimizationJob {
        let job = OptimizationJob::new(request);
        self.inner.insert(job.id, job.clone());
        job
    }

    fn get(&self, id: Uuid) -> JobResult<OptimizationJob> {
        self.inner
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(JobError::NotFound(id))
    }

    fn mark_processing(&self, id: Uuid) -> JobResult<OptimizationJob> {
        self.transition(id, JobStatus::Processing, |job| {
            job.started_at = Some(Utc::now());
            job.progress = PROGRESS_CLAIMED;
        })
    }

    fn record_progress(&self, id: Uuid, progress: u8) -> JobResult<bool> {
        let mut entry = self.inner.get_mut(&id).ok_or(JobError::NotFound(id))?;
        let job = entry.value_mut();
        if job.status != JobStatus::Processing || job.progress >= progress {
            return Ok(false);
        }
        job.progress = progress.min(PROGRESS_DONE);
        Ok(true)
    }

    fn mark_completed(&self, id: Uuid, result: SolverOutput) -> JobResult<OptimizationJob> {
        self.transition(id, JobStatus::Completed, |job| {
            job.result = Some(result);
            job.progress = PROGRESS_DONE;
            job.completed_at = Some(Utc::now());
        })
    }

    fn mark_failed(&self, id: Uuid, message: String) -> JobResult<OptimizationJob> {
        self.transition(id, JobStatus::Failed, |job| {
            job.error = Some(message);
            job.completed_at = Some(Utc::now());
        })
    }

    fn count(&self) -> usize {
        self.inner.len()
    }

    fn stats(&self) -> JobStats {
        let mut stats = JobStats::default();
        for r in self.inner.iter() {
            stats.record(r.value().status);
        }
        stats
    }

    fn pending_ids(&self) -> Vec<Uuid> {
        let mut pending: Vec<_> = self
            .inner
            .iter()
            .filter(|r| r.value().status == JobStatus::Pending)
            .map(|r| (r.value().created_at, *r.key()))
            .collect();
        pending.sort();
        pending.into_iter().map(|(_, id)| id).collect()
    }
}
