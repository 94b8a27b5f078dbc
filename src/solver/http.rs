//! HTTP client for the remote optimizer service.
//!
//! # Responsibilities
//! - POST the stored request to `{base_url}/optimize`
//! - Bound every call by the caller's deadline
//! - Classify failures (transport, status, body, decode)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use url::Url;

use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::solver::types::{OptimizationRequest, SolverError, SolverOutput, SolverResult};
use crate::solver::Solver;

/// Maximum number of body bytes quoted in error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// Solver reached over HTTP.
#[derive(Clone)]
pub struct HttpSolver {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSolver {
    /// Create a solver client for the service rooted at `base_url`.
    pub fn new(base_url: &str) -> SolverResult<Self> {
        let mut base: Url = base_url.parse().map_err(|e| {
            SolverError::Transport(format!("invalid solver URL '{}': {}", base_url, e))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("optimize")
            .map_err(|e| SolverError::Transport(e.to_string()))?;

        // The solver lives on the internal network; system proxies do not apply.
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| SolverError::Transport(e.to_string()))?;

        tracing::info!(endpoint = %endpoint, "Solver client initialized");
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call(&self, request: &OptimizationRequest, timeout: Duration) -> SolverResult<SolverOutput> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SolverError::Timeout(timeout)
                } else {
                    SolverError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SolverError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SolverError::Rejected {
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&body)),
            });
        }

        let output: SolverOutput = serde_json::from_slice(&body)
            .map_err(|e| SolverError::Malformed(e.to_string()))?;

        if output.success == Some(false) {
            return Err(SolverError::Reported(
                output.error.unwrap_or_else(|| "no error message".to_string()),
            ));
        }

        Ok(output)
    }
}

#[async_trait]
impl Solver for HttpSolver {
    async fn solve(&self, request: &OptimizationRequest, timeout: Duration) -> SolverResult<SolverOutput> {
        let start = Instant::now();
        tracing::debug!(
            endpoint = %self.endpoint,
            customers = request.customers.len(),
            vehicles = request.vehicles.len(),
            "Calling solver"
        );

        let result = match with_deadline(timeout, self.call(request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(SolverError::Timeout(timeout)),
        };

        metrics::record_solver_call(self.name(), result.is_ok(), start);
        result
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
