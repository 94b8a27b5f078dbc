//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and metrics from validated configuration
//! - Build subsystems in dependency order
//! - Start the worker pool and bind the listener
//! - Run until shutdown, then drain and persist
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::{AppConfig, ConfigError};
use crate::http::HttpServer;
use crate::jobs::{InMemoryJobStore, JobController, WorkerPool};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::{logging, metrics};
use crate::solver::{HttpSolver, Solver, SolverError};
use crate::tolls::{CorridorIndex, CorridorMatcher, TollError, VehicleClass};

/// Fatal errors while bringing the service up or down.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("toll corridors: {0}")]
    Tolls(#[from] TollError),

    #[error("solver: {0}")]
    Solver(#[from] SolverError),

    #[error("job store snapshot: {0}")]
    Store(std::io::Error),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Install logging, then the metrics exporter when enabled.
pub fn init_observability(config: &AppConfig) {
    logging::init(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
}

/// A fully wired service, bound and ready to serve.
pub struct Application {
    config: AppConfig,
    controller: Arc<JobController>,
    store: Arc<InMemoryJobStore>,
    worker: Option<JoinHandle<()>>,
    shutdown: Shutdown,
    server_shutdown: broadcast::Receiver<()>,
    listener: TcpListener,
}

impl Application {
    /// Build the service with the HTTP solver from `config.solver`.
    pub async fn build(config: AppConfig) -> Result<Self, StartupError> {
        let solver = Arc::new(HttpSolver::new(&config.solver.url)?);
        Self::build_with_solver(config, solver).await
    }

    /// Build the service around an arbitrary solver.
    pub async fn build_with_solver(
        config: AppConfig,
        solver: Arc<dyn Solver>,
    ) -> Result<Self, StartupError> {
        let index = match &config.tolls.corridors_path {
            Some(path) => CorridorIndex::load(Path::new(path))?,
            None => CorridorIndex::builtin()?,
        };
        tracing::info!(
            corridors = index.len(),
            highways = index.highways().len(),
            source = config.tolls.corridors_path.as_deref().unwrap_or("builtin"),
            "Toll corridors loaded"
        );
        let matcher = CorridorMatcher::new(Arc::new(index))
            .with_direction_tolerance(config.tolls.direction_tolerance)
            .with_gate_radius_km(config.tolls.gate_radius_km);
        let default_class = VehicleClass::parse_vehicle_type(&config.tolls.default_vehicle_class)?;

        let store = Arc::new(match &config.store.snapshot_path {
            Some(path) => InMemoryJobStore::load_from_file(path).map_err(StartupError::Store)?,
            None => InMemoryJobStore::new(None),
        });

        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();
        let mut controller = JobController::new(store.clone(), solver, matcher)
            .with_solver_timeout(Duration::from_secs(config.solver.timeout_secs))
            .with_default_vehicle_class(default_class);

        let queue = if config.worker.enabled {
            let (tx, rx) = mpsc::channel(config.worker.queue_capacity);
            controller = controller.with_dispatcher(tx);
            Some(rx)
        } else {
            tracing::info!("Worker pool disabled; jobs run only via the process endpoint");
            None
        };
        let controller = Arc::new(controller);

        let worker = queue.map(|rx| {
            WorkerPool::new(controller.clone(), rx, &config.worker, shutdown.subscribe())
                .with_shutdown_grace(Duration::from_secs(config.timeouts.shutdown_grace_secs))
                .spawn()
        });

        let listener = TcpListener::bind(&config.listener.bind_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "Listening for connections");

        Ok(Self {
            config,
            controller,
            store,
            worker,
            shutdown,
            server_shutdown,
            listener,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops the service when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn controller(&self) -> Arc<JobController> {
        self.controller.clone()
    }

    /// Serve until shutdown, then drain the worker pool and save the snapshot.
    pub async fn run(self) -> Result<(), StartupError> {
        let server = HttpServer::new(&self.config, self.controller.clone());
        let served = server.run(self.listener, self.server_shutdown).await;

        // The server also returns on I/O failure; stop the pool either way.
        tracing::info!(
            listeners = self.shutdown.receiver_count(),
            "Stopping background tasks"
        );
        self.shutdown.trigger();
        if let Some(worker) = self.worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Worker pool task failed");
            }
        }

        self.store.save_to_file().map_err(StartupError::Store)?;
        served?;
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
