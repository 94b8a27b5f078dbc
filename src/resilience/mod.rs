//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the solver:
//!     → timeouts.rs (enforce the configured deadline)
//!     → expiry surfaces as SolverError::Timeout and fails the job
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries: a failed job is resubmitted by the client

pub mod timeouts;
