//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     config → logging → metrics → corridors → store (snapshot load)
//!         → solver → controller → worker pool → listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → server drains → worker pool drains → snapshot saved
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Fail fast: any startup error is fatal
//! - Shutdown has a grace period for running jobs

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Application, StartupError};
