//! Route optimization job service.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌───────────────────────────────────────────────────┐
//!                          │              FLEET OPTIMIZER                       │
//!                          │                                                    │
//!   POST /optimize/jobs    │  ┌─────────┐    ┌────────────┐    ┌────────────┐   │
//!   ───────────────────────┼─▶│  http   │───▶│ controller │───▶│ job store  │   │
//!                          │  │ server  │    │  (submit)  │    │ (DashMap)  │   │
//!                          │  └─────────┘    └─────┬──────┘    └─────▲──────┘   │
//!                          │                       │ queue           │          │
//!                          │                       ▼                 │          │
//!                          │                ┌────────────┐           │          │
//!                          │                │ worker pool│───────────┘          │
//!                          │                │ (execute)  │                      │
//!                          │                └─────┬──────┘                      │
//!                          │                      │                             │
//!                          │          ┌───────────┴────────────┐                │
//!                          │          ▼                        ▼                │
//!                          │   ┌─────────────┐         ┌───────────────┐        │
//!                          │   │   solver    │─────────┼──────────────▶│────────┼──▶ Remote
//!                          │   │ (HTTP, dl)  │         │ toll matcher  │        │    Solver
//!                          │   └─────────────┘         │ + corridors   │        │
//!                          │                           └───────────────┘        │
//!                          │  ┌──────────────────────────────────────────────┐  │
//!                          │  │ config · observability · lifecycle · timeouts │  │
//!                          │  └──────────────────────────────────────────────┘  │
//!                          └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use fleet_optimizer::config::load_from_env_or_default;
use fleet_optimizer::lifecycle::{signals, startup};
use fleet_optimizer::Application;

#[derive(Parser)]
#[command(name = "fleet-optimizer")]
#[command(about = "Route optimization job service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file (falls back to FLEET_CONFIG).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_from_env_or_default(args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fleet-optimizer: {}", e);
            std::process::exit(2);
        }
    };

    startup::init_observability(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fleet-optimizer starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        solver_url = %config.solver.url,
        solver_timeout_secs = config.solver.timeout_secs,
        worker_concurrency = config.worker.concurrency,
        "Configuration loaded"
    );

    let app = Application::build(config).await?;
    signals::spawn_signal_listener(app.shutdown_handle());
    app.run().await?;

    Ok(())
}
