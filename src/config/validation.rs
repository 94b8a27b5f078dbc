//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, concurrency > 0)
//! - Request timeout must outlast the solver deadline
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::AppConfig;
use crate::tolls::VehicleClass;

/// A single semantic problem, keyed by the dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic rule and report all violations.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if url::Url::parse(&config.solver.url).is_err() {
        errors.push(ValidationError::new(
            "solver.url",
            format!("'{}' is not a valid URL", config.solver.url),
        ));
    }
    if config.solver.timeout_secs == 0 {
        errors.push(ValidationError::new("solver.timeout_secs", "must be > 0"));
    }
    if config.timeouts.request_secs <= config.solver.timeout_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!(
                "must exceed solver.timeout_secs ({}s) so inline processing can finish",
                config.solver.timeout_secs
            ),
        ));
    }

    if config.worker.concurrency == 0 {
        errors.push(ValidationError::new("worker.concurrency", "must be > 0"));
    }
    if config.worker.queue_capacity == 0 {
        errors.push(ValidationError::new("worker.queue_capacity", "must be > 0"));
    }
    if config.worker.sweep_interval_ms == 0 {
        errors.push(ValidationError::new("worker.sweep_interval_ms", "must be > 0"));
    }

    if VehicleClass::parse_vehicle_type(&config.tolls.default_vehicle_class).is_err() {
        errors.push(ValidationError::new(
            "tolls.default_vehicle_class",
            format!("unknown vehicle class '{}'", config.tolls.default_vehicle_class),
        ));
    }
    let tolerance = config.tolls.direction_tolerance;
    if !(0.0..1.0).contains(&tolerance) {
        errors.push(ValidationError::new(
            "tolls.direction_tolerance",
            "must be in [0, 1)",
        ));
    }
    let radius = config.tolls.gate_radius_km;
    if !(radius.is_finite() && radius > 0.0) {
        errors.push(ValidationError::new("tolls.gate_radius_km", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
