//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the optimization job service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Request and drain timeouts.
    pub timeouts: TimeoutConfig,

    /// Remote solver endpoint.
    pub solver: SolverConfig,

    /// Background execution settings.
    pub worker: WorkerConfig,

    /// Job store persistence.
    pub store: StoreConfig,

    /// Toll corridor catalogue and matching.
    pub tolls: TollConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for the HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request timeout for API calls in seconds.
    ///
    /// `POST /optimize/jobs/{id}/process` waits for the solver, so this must
    /// exceed `solver.timeout_secs`.
    pub request_secs: u64,

    /// How long shutdown waits for in-flight jobs before giving up.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 330,
            shutdown_grace_secs: 10,
        }
    }
}

/// Remote solver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Base URL; requests go to `{url}/optimize`.
    pub url: String,

    /// Hard deadline for one solver call in seconds.
    pub timeout_secs: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Start the background pool. When disabled, jobs only run through the
    /// process endpoint.
    pub enabled: bool,

    /// Maximum number of jobs executing at once.
    pub concurrency: usize,

    /// Capacity of the dispatch queue.
    pub queue_capacity: usize,

    /// Interval between sweeps for pending jobs in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 4,
            queue_capacity: 256,
            sweep_interval_ms: 5000,
        }
    }
}

/// Job store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file loaded at startup and written on shutdown.
    pub snapshot_path: Option<String>,
}

/// Toll matching configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TollConfig {
    /// TOML file with `[[corridors]]` and `[[highways]]`; the built-in
    /// catalogue when unset.
    pub corridors_path: Option<String>,

    /// Class used for routes whose vehicle has no type.
    pub default_vehicle_class: String,

    /// |cos θ| below which a segment's direction is undetermined.
    pub direction_tolerance: f64,

    /// Distance from a motorway toll gate within which a route passes it.
    pub gate_radius_km: f64,
}

impl Default for TollConfig {
    fn default() -> Self {
        Self {
            corridors_path: None,
            default_vehicle_class: "truck".to_string(),
            direction_tolerance: crate::tolls::matcher::DEFAULT_DIRECTION_TOLERANCE,
            gate_radius_km: crate::tolls::highway::DEFAULT_GATE_RADIUS_KM,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
