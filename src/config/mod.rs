//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, from --config or FLEET_CONFIG)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → AppConfig (validated, immutable)
//!     → handed by value to startup, which slices it per subsystem
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults so an empty file (or no file) is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env_or_default, ConfigError, CONFIG_ENV_VAR};
pub use schema::{
    AppConfig, ListenerConfig, ObservabilityConfig, SolverConfig, StoreConfig, TimeoutConfig,
    TollConfig, WorkerConfig,
};
pub use validation::{validate_config, ValidationError};
