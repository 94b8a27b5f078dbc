//! Background job execution.
//!
//! # Responsibilities
//! - Receive job ids from the dispatch queue
//! - Periodically sweep the store for pending jobs the queue missed
//! - Run `execute` with bounded concurrency
//! - Drain in-flight jobs on shutdown
//!
//! # Design Decisions
//! - A job id is scheduled at most once at a time; the store's single-claim
//!   rule covers any overlap with the process endpoint
//! - Shutdown closes the semaphore so queued-but-not-started jobs stay pending

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::jobs::controller::JobController;
use crate::resilience::timeouts::with_deadline;

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Executes pending jobs in the background.
pub struct WorkerPool {
    controller: Arc<JobController>,
    queue: mpsc::Receiver<Uuid>,
    permits: Arc<Semaphore>,
    sweep_interval: Duration,
    shutdown_grace: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl WorkerPool {
    pub fn new(
        controller: Arc<JobController>,
        queue: mpsc::Receiver<Uuid>,
        config: &WorkerConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            controller,
            queue,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            sweep_interval: Duration::from_millis(config.sweep_interval_ms.max(1)),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            shutdown,
        }
    }

    /// How long shutdown waits for running jobs.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Dispatch until shutdown, then wait for running jobs.
    pub async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tasks: JoinSet<Uuid> = JoinSet::new();
        let mut scheduled: HashSet<Uuid> = HashSet::new();

        tracing::info!(
            concurrency = self.permits.available_permits(),
            sweep_interval_ms = self.sweep_interval.as_millis() as u64,
            "Worker pool started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(in_flight = tasks.len(), "Worker pool stopping");
                    break;
                }
                Some(id) = self.queue.recv() => {
                    self.schedule(id, &mut tasks, &mut scheduled);
                }
                _ = sweep.tick() => {
                    let pending = self.controller.pending_ids();
                    if !pending.is_empty() {
                        tracing::debug!(pending = pending.len(), "Sweep found pending jobs");
                    }
                    for id in pending {
                        self.schedule(id, &mut tasks, &mut scheduled);
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    match joined {
                        Ok(id) => {
                            scheduled.remove(&id);
                        }
                        Err(e) => tracing::error!(error = %e, "Worker task aborted"),
                    }
                }
            }
        }

        self.permits.close();
        let drained = with_deadline(self.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                grace = ?self.shutdown_grace,
                "Shutdown grace elapsed with jobs still running"
            );
            tasks.abort_all();
        }
        tracing::info!("Worker pool stopped");
    }

    fn schedule(&self, id: Uuid, tasks: &mut JoinSet<Uuid>, scheduled: &mut HashSet<Uuid>) {
        if !scheduled.insert(id) {
            return;
        }

        let controller = self.controller.clone();
        let permits = self.permits.clone();
        tasks.spawn(async move {
            // Closed semaphore means shutdown; the job stays pending.
            let Ok(_permit) = permits.acquire_owned().await else {
                return id;
            };
            match controller.execute(id).await {
                Ok(outcome) => {
                    tracing::debug!(job_id = %id, outcome = outcome.as_str(), "Worker finished job");
                }
                Err(e) => tracing::error!(job_id = %id, error = %e, "Worker failed to execute job"),
            }
            id
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::{InMemoryJobStore, JobStore};
    use crate::jobs::types::JobStatus;
    use crate::solver::{OptimizationRequest, Solver, SolverOutput, SolverResult};
    use crate::tolls::{CorridorIndex, CorridorMatcher};
    use async_trait::async_trait;
    use serde_json::json;

    struct EmptySolver;

    #[async_trait]
    impl Solver for EmptySolver {
        async fn solve(&self, _request: &OptimizationRequest, _timeout: Duration) -> SolverResult<SolverOutput> {
            Ok(serde_json::from_value(json!({"routes": []})).unwrap())
        }
    }

    fn request() -> OptimizationRequest {
        serde_json::from_value(json!({
            "depots": [{"id": "d1", "location": {"lat": 41.0, "lng": 29.0}}],
            "vehicles": [{"id": "v1"}],
            "customers": [{"id": "c1", "location": {"lat": 41.1, "lng": 29.1}}]
        }))
        .unwrap()
    }

    fn config(sweep_interval_ms: u64) -> WorkerConfig {
        WorkerConfig {
            enabled: true,
            concurrency: 2,
            queue_capacity: 8,
            sweep_interval_ms,
        }
    }

    async fn wait_for(store: &InMemoryJobStore, id: Uuid, status: JobStatus) {
        for _ in 0..100 {
            if store.get(id).unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {id} never reached {status}");
    }

    #[tokio::test]
    async fn test_queued_job_runs() {
        let store = Arc::new(InMemoryJobStore::new(None));
        let (tx, rx) = mpsc::channel(8);
        let controller = Arc::new(
            JobController::new(
                store.clone(),
                Arc::new(EmptySolver),
                CorridorMatcher::new(Arc::new(CorridorIndex::builtin().unwrap())),
            )
            .with_dispatcher(tx),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = WorkerPool::new(controller.clone(), rx, &config(60_000), shutdown_rx).spawn();

        let id = controller.submit(request()).unwrap().job_id;
        wait_for(&store, id, JobStatus::Completed).await;

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_picks_up_unqueued_jobs() {
        let store = Arc::new(InMemoryJobStore::new(None));
        // Created behind the controller's back, as after a snapshot load.
        let id = store.create(request()).id;

        let (_tx, rx) = mpsc::channel(8);
        let controller = Arc::new(JobController::new(
            store.clone(),
            Arc::new(EmptySolver),
            CorridorMatcher::new(Arc::new(CorridorIndex::builtin().unwrap())),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = WorkerPool::new(controller, rx, &config(50), shutdown_rx).spawn();

        wait_for(&store, id, JobStatus::Completed).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let store = Arc::new(InMemoryJobStore::new(None));
        let (_tx, rx) = mpsc::channel(8);
        let controller = Arc::new(JobController::new(
            store,
            Arc::new(EmptySolver),
            CorridorMatcher::new(Arc::new(CorridorIndex::builtin().unwrap())),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = WorkerPool::new(controller, rx, &config(60_000), shutdown_rx)
            .with_shutdown_grace(Duration::from_millis(100))
            .spawn();

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("pool did not stop")
            .unwrap();
    }
}
