//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, timeout, body limit)
//!     → jobs.rs (extract, call JobController, map errors)
//!     → JSON response
//! ```

pub mod jobs;
pub mod server;

pub use jobs::ApiError;
pub use server::{AppState, HttpServer};
