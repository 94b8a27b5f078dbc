//! Route optimization job service.
//!
//! Accepts vehicle-routing requests, runs them against a remote solver in the
//! background, and attributes bridge, tunnel and toll-highway crossings to
//! each solved route before clients poll the result.

pub mod config;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod solver;
pub mod tolls;

pub use config::AppConfig;
pub use http::HttpServer;
pub use jobs::{JobController, JobStore};
pub use lifecycle::{Application, Shutdown};
pub use solver::Solver;
pub use tolls::{CorridorIndex, CorridorMatcher};
