//! External route solver.
//!
//! # Data Flow
//! ```text
//! JobController::execute
//!     → Solver::solve(request, timeout)
//!         → http.rs (POST {solver.url}/optimize, bounded by timeout)
//!     → SolverOutput { routes, summary }
//! ```
//!
//! # Design Decisions
//! - The solver is a black box behind a trait object so tests substitute scripted solvers
//! - Every call carries a deadline; expiry is reported as `SolverError::Timeout`
//! - Non-success statuses and undecodable bodies are solver failures, never panics

pub mod http;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

pub use http::HttpSolver;
pub use types::{
    Customer, Depot, OptimizationRequest, ResultSummary, RouteStop, SolvedRoute, SolverError,
    SolverOutput, SolverResult, Vehicle, VehicleType,
};

/// A remote vehicle-routing solver.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Solve `request`, giving up after `timeout`.
    async fn solve(&self, request: &OptimizationRequest, timeout: Duration) -> SolverResult<SolverOutput>;

    /// Short label for logs and metrics.
    fn name(&self) -> &str {
        "solver"
    }
}
