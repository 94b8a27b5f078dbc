//! Optimization job subsystem.
//!
//! # Data Flow
//! ```text
//! submit(request)
//!     → controller.rs (validate, store.create → pending)
//!     → dispatch queue → worker.rs (bounded concurrency)
//!
//! execute(id)
//!     → store.mark_processing (single claim, progress 10)
//!     → Solver::solve (bounded by solver timeout, progress 30)
//!     → CorridorMatcher per route (crossings, motorway usage, toll_cost, total_cost)
//!     → store.mark_completed (progress 100) | store.mark_failed
//!
//! poll(id)
//!     → store.get → JobView (camelCase, processingTimeSeconds derived)
//! ```
//!
//! # Design Decisions
//! - pending → processing → {completed, failed}; terminal states never change
//! - The store is shared behind `Arc<dyn JobStore>` so alternative backends slot in
//! - Jobs are never deleted by the service

pub mod controller;
pub mod store;
pub mod types;
pub mod worker;

pub use controller::{ExecuteOutcome, JobController, CANCELLED_MESSAGE};
pub use store::{InMemoryJobStore, JobStore, INTERRUPTED_MESSAGE};
pub use types::{
    JobError, JobResult, JobStats, JobStatus, JobView, OptimizationJob, SubmitReceipt,
    PROGRESS_CLAIMED, PROGRESS_DONE, PROGRESS_SOLVING,
};
pub use worker::WorkerPool;
