//! Job lifecycle controller.
//!
//! # Responsibilities
//! - Validate and accept submissions
//! - Claim, execute and settle jobs against the solver
//! - Fold toll crossings and motorway charges into each solved route
//!
//! # Design Decisions
//! - The store is the only arbiter of state; a lost claim is not an error
//! - Every failure inside execution, panics included, ends in `mark_failed`

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::jobs::store::JobStore;
use crate::jobs::types::{
    JobError, JobResult, JobStats, JobView, OptimizationJob, SubmitReceipt, PROGRESS_SOLVING,
};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::solver::{
    OptimizationRequest, ResultSummary, SolvedRoute, Solver, SolverError, SolverOutput,
};
use crate::tolls::geometry::decode_polyline;
use crate::tolls::{CorridorMatcher, LatLng, VehicleClass};

/// Message recorded when an operator cancels a job.
pub const CANCELLED_MESSAGE: &str = "cancelled by user";

const DEFAULT_SOLVER_TIMEOUT: Duration = Duration::from_secs(300);

/// How a call to [`JobController::execute`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    Completed,
    Failed,
    /// Another executor claimed the job first, or it was not pending.
    NotClaimed,
    /// The job was settled elsewhere (cancelled) while executing.
    Superseded,
}

impl ExecuteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecuteOutcome::Completed => "completed",
            ExecuteOutcome::Failed => "failed",
            ExecuteOutcome::NotClaimed => "not_claimed",
            ExecuteOutcome::Superseded => "superseded",
        }
    }
}

/// State machine driver between clients, the store and the solver.
pub struct JobController {
    store: Arc<dyn JobStore>,
    solver: Arc<dyn Solver>,
    matcher: CorridorMatcher,
    solver_timeout: Duration,
    default_vehicle_class: VehicleClass,
    dispatcher: Option<mpsc::Sender<Uuid>>,
}

impl JobController {
    pub fn new(store: Arc<dyn JobStore>, solver: Arc<dyn Solver>, matcher: CorridorMatcher) -> Self {
        Self {
            store,
            solver,
            matcher,
            solver_timeout: DEFAULT_SOLVER_TIMEOUT,
            default_vehicle_class: VehicleClass::Truck,
            dispatcher: None,
        }
    }

    pub fn with_solver_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = timeout;
        self
    }

    pub fn with_default_vehicle_class(mut self, class: VehicleClass) -> Self {
        self.default_vehicle_class = class;
        self
    }

    /// Notify the worker pool of new submissions through `dispatcher`.
    pub fn with_dispatcher(mut self, dispatcher: mpsc::Sender<Uuid>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Validate `request` and record it as a pending job.
    pub fn submit(&self, request: OptimizationRequest) -> JobResult<SubmitReceipt> {
        if request.depots.is_empty() {
            return Err(JobError::InvalidRequest("at least one depot is required".into()));
        }
        if request.vehicles.is_empty() {
            return Err(JobError::InvalidRequest("at least one vehicle is required".into()));
        }
        if request.customers.is_empty() {
            return Err(JobError::InvalidRequest("at least one customer is required".into()));
        }

        let job = self.store.create(request);
        metrics::record_job_submitted();
        tracing::info!(
            job_id = %job.id,
            depots = job.request.depots.len(),
            vehicles = job.request.vehicles.len(),
            customers = job.request.customers.len(),
            "Job submitted"
        );

        if let Some(dispatcher) = &self.dispatcher {
            // A full or closed queue is fine: the periodic sweep finds pending jobs.
            if let Err(e) = dispatcher.try_send(job.id) {
                tracing::warn!(job_id = %job.id, error = %e, "Dispatch queue rejected job");
            }
        }

        Ok(SubmitReceipt::from(&job))
    }

    pub fn poll(&self, id: Uuid) -> JobResult<JobView> {
        let job = self.store.get(id)?;
        Ok(JobView::from_job(job, Utc::now()))
    }

    /// Force a non-terminal job to failed.
    pub fn cancel(&self, id: Uuid) -> JobResult<JobView> {
        let job = self.store.mark_failed(id, CANCELLED_MESSAGE.to_string())?;
        tracing::info!(job_id = %id, "Job cancelled");
        Ok(JobView::from_job(job, Utc::now()))
    }

    pub fn stats(&self) -> JobStats {
        self.store.stats()
    }

    pub fn pending_ids(&self) -> Vec<Uuid> {
        self.store.pending_ids()
    }

    /// Claim and run a job to a terminal state.
    ///
    /// Errors only when the job does not exist or the store misbehaves;
    /// solver and output problems are recorded on the job and reported as
    /// [`ExecuteOutcome::Failed`].
    pub async fn execute(&self, id: Uuid) -> JobResult<ExecuteOutcome> {
        let job = match self.store.mark_processing(id) {
            Ok(job) => job,
            Err(JobError::InvalidTransition { from, .. }) => {
                tracing::debug!(job_id = %id, status = %from, "Job not claimable");
                return Ok(ExecuteOutcome::NotClaimed);
            }
            Err(e) => return Err(e),
        };

        let started = Instant::now();
        metrics::record_job_started();
        tracing::info!(job_id = %id, solver = self.solver.name(), "Job processing");

        let run = AssertUnwindSafe(self.run(&job)).catch_unwind().await;
        let settled = match run {
            Ok(Ok(output)) => self.settle_completed(id, output),
            Ok(Err(err)) => self.settle_failed(id, err.to_string()),
            Err(panic) => {
                let message = format!("internal error: {}", panic_message(panic.as_ref()));
                self.settle_failed(id, message)
            }
        };

        let status = match &settled {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "error",
        };
        metrics::record_job_finished(status, started);
        settled
    }

    async fn run(&self, job: &OptimizationJob) -> JobResult<SolverOutput> {
        let request = &job.request;
        self.store.record_progress(job.id, PROGRESS_SOLVING)?;
        let mut output =
            match with_deadline(self.solver_timeout, self.solver.solve(request, self.solver_timeout)).await {
                Ok(result) => result?,
                Err(elapsed) => return Err(SolverError::Timeout(elapsed.0).into()),
            };

        if output.success == Some(false) {
            let message = output
                .error
                .take()
                .unwrap_or_else(|| "no error message".to_string());
            return Err(SolverError::Reported(message).into());
        }

        for route in &mut output.routes {
            self.attach_tolls(job.id, request, route)?;
        }
        fold_summary(&mut output);
        Ok(output)
    }

    /// Match one route against the corridor index and rewrite its costs.
    fn attach_tolls(&self, id: Uuid, request: &OptimizationRequest, route: &mut SolvedRoute) -> JobResult<()> {
        let coordinates = route_coordinates(request, route)?;
        let class = self.vehicle_class(request, route)?;
        let tolls = self.matcher.price_route(&coordinates, class)?;

        for crossing in &tolls.crossings.attributions {
            metrics::record_toll_crossing(&crossing.corridor_name);
            tracing::debug!(
                job_id = %id,
                vehicle_id = %route.vehicle_id,
                corridor = %crossing.corridor_name,
                vehicle_class = %crossing.vehicle_class,
                cost = crossing.cost,
                "Toll crossing attributed"
            );
        }

        for usage in &tolls.highway_usage {
            tracing::debug!(
                job_id = %id,
                vehicle_id = %route.vehicle_id,
                highway = %usage.highway,
                entry = %usage.entry,
                exit = %usage.exit,
                distance_km = usage.distance_km,
                cost = usage.cost,
                "Motorway usage attributed"
            );
        }

        route.toll_cost = round2(tolls.total());
        route.highway_cost = tolls.highway_total;
        route.toll_crossings = tolls.crossings.attributions;
        route.highway_usage = tolls.highway_usage;
        route.total_cost =
            round2(route.fuel_cost + route.distance_cost + route.fixed_cost + route.toll_cost);
        Ok(())
    }

    /// Route vehicle type, then the request's vehicle record, then the default.
    fn vehicle_class(&self, request: &OptimizationRequest, route: &SolvedRoute) -> JobResult<VehicleClass> {
        let declared = route.vehicle_type.as_ref().or_else(|| {
            request
                .vehicle(&route.vehicle_id)
                .and_then(|v| v.vehicle_type.as_ref())
        });
        match declared {
            Some(vehicle_type) => Ok(vehicle_type.toll_class()?),
            None => Ok(self.default_vehicle_class),
        }
    }

    fn settle_completed(&self, id: Uuid, output: SolverOutput) -> JobResult<ExecuteOutcome> {
        let routes = output.routes.len();
        let toll_total = output.summary.as_ref().map(|s| s.total_toll_cost).unwrap_or_default();
        match self.store.mark_completed(id, output) {
            Ok(_) => {
                tracing::info!(job_id = %id, routes, toll_total, "Job completed");
                Ok(ExecuteOutcome::Completed)
            }
            Err(JobError::InvalidTransition { from, .. }) => {
                tracing::warn!(job_id = %id, status = %from, "Job settled elsewhere; result dropped");
                Ok(ExecuteOutcome::Superseded)
            }
            Err(e) => Err(e),
        }
    }

    fn settle_failed(&self, id: Uuid, message: String) -> JobResult<ExecuteOutcome> {
        tracing::warn!(job_id = %id, error = %message, "Job failed");
        match self.store.mark_failed(id, message) {
            Ok(_) => Ok(ExecuteOutcome::Failed),
            Err(JobError::InvalidTransition { from, .. }) => {
                tracing::warn!(job_id = %id, status = %from, "Job settled elsewhere; failure dropped");
                Ok(ExecuteOutcome::Superseded)
            }
            Err(e) => Err(e),
        }
    }
}

/// Points handed to the matcher for one route.
///
/// The decoded geometry when it has at least two points, otherwise
/// depot → stops → depot. A route without `depot_id` uses the request's
/// depot when there is exactly one.
fn route_coordinates(request: &OptimizationRequest, route: &SolvedRoute) -> JobResult<Vec<LatLng>> {
    if let Some(encoded) = route.geometry.as_deref() {
        match decode_polyline(encoded) {
            Ok(points) if points.len() >= 2 => return Ok(points),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(vehicle_id = %route.vehicle_id, error = %e, "Ignoring route geometry");
            }
        }
    }

    let depot = match route.depot_id.as_deref() {
        Some(depot_id) => Some(request.depot(depot_id).ok_or_else(|| {
            JobError::InvalidOutput(format!(
                "route for vehicle '{}' starts at unknown depot '{}'",
                route.vehicle_id, depot_id
            ))
        })?),
        None if request.depots.len() == 1 => request.depots.first(),
        None => None,
    };

    let mut points = Vec::with_capacity(route.stops.len() + 2);
    if let Some(depot) = depot {
        points.push(depot.location);
    }
    points.extend(route.stops.iter().map(|s| s.location));
    if let Some(depot) = depot {
        points.push(depot.location);
    }
    Ok(points)
}

/// Bring summary totals in line with the augmented routes.
fn fold_summary(output: &mut SolverOutput) {
    let routes = &output.routes;
    let toll: f64 = routes.iter().map(|r| r.toll_cost).sum();
    let total: f64 = routes.iter().map(|r| r.total_cost).sum();

    let summary = output.summary.get_or_insert_with(|| ResultSummary {
        total_routes: routes.len(),
        total_distance_km: round2(routes.iter().map(|r| r.distance_km).sum()),
        total_fuel_cost: round2(routes.iter().map(|r| r.fuel_cost).sum()),
        total_distance_cost: round2(routes.iter().map(|r| r.distance_cost).sum()),
        total_fixed_cost: round2(routes.iter().map(|r| r.fixed_cost).sum()),
        ..ResultSummary::default()
    });
    summary.total_toll_cost = round2(toll);
    summary.total_cost = round2(total);
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "panic"
    }
}

impl std::fmt::Debug for JobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobController")
            .field("solver", &self.solver.name())
            .field("solver_timeout", &self.solver_timeout)
            .field("default_vehicle_class", &self.default_vehicle_class)
            .field("dispatching", &self.dispatcher.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use crate::jobs::types::JobStatus;
    use crate::tolls::corridor::tests::bridge_x;
    use crate::tolls::highway::tests::highway_h;
    use crate::tolls::CorridorIndex;
    use async_trait::async_trait;
    use serde_json::json;

    /// Returns a clone of a fixed output, or panics when asked to.
    struct ScriptedSolver {
        output: Option<SolverOutput>,
    }

    #[async_trait]
    impl Solver for ScriptedSolver {
        async fn solve(&self, _request: &OptimizationRequest, _timeout: Duration) -> crate::solver::SolverResult<SolverOutput> {
            match &self.output {
                Some(output) => Ok(output.clone()),
                None => panic!("solver exploded"),
            }
        }
    }

    fn request(vehicle: serde_json::Value) -> OptimizationRequest {
        serde_json::from_value(json!({
            "depots": [{"id": "d1", "location": {"lat": 40.01, "lng": 29.01}}],
            "vehicles": [vehicle],
            "customers": [{"id": "c1", "location": {"lat": 40.09, "lng": 29.09}}]
        }))
        .unwrap()
    }

    fn crossing_output() -> SolverOutput {
        serde_json::from_value(json!({
            "routes": [{
                "vehicle_id": "v1",
                "depot_id": "d1",
                "stops": [{"customer_id": "c1", "location": {"lat": 40.09, "lng": 29.09}}],
                "fuel_cost": 100.0,
                "distance_cost": 20.0,
                "fixed_cost": 5.0,
                "total_cost": 125.0
            }],
            "summary": {"total_routes": 1, "total_cost": 125.0}
        }))
        .unwrap()
    }

    fn controller(output: Option<SolverOutput>) -> (JobController, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new(None));
        let index = Arc::new(CorridorIndex::new(vec![bridge_x()]).unwrap());
        let controller = JobController::new(
            store.clone(),
            Arc::new(ScriptedSolver { output }),
            CorridorMatcher::new(index),
        );
        (controller, store)
    }

    #[test]
    fn test_submit_rejects_empty_lists() {
        let (controller, store) = controller(None);
        let mut empty_vehicles = request(json!({"id": "v1"}));
        empty_vehicles.vehicles.clear();

        let err = controller.submit(empty_vehicles).unwrap_err();
        assert!(matches!(err, JobError::InvalidRequest(_)));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_submit_and_poll() {
        let (controller, _) = controller(None);
        let receipt = controller.submit(request(json!({"id": "v1"}))).unwrap();
        assert_eq!(receipt.status, JobStatus::Pending);

        let view = controller.poll(receipt.job_id).unwrap();
        assert_eq!(view.status, JobStatus::Pending);
        assert!(view.result.is_none() && view.error.is_none());
        assert!(matches!(controller.poll(Uuid::new_v4()), Err(JobError::NotFound(_))));
    }

    #[test]
    fn test_submit_notifies_dispatcher() {
        let (controller, _) = controller(None);
        let (tx, mut rx) = mpsc::channel(4);
        let controller = controller.with_dispatcher(tx);
        let receipt = controller.submit(request(json!({"id": "v1"}))).unwrap();
        assert_eq!(rx.try_recv().unwrap(), receipt.job_id);
    }

    #[tokio::test]
    async fn test_execute_attaches_tolls() {
        let (controller, _) = controller(Some(crossing_output()));
        let id = controller.submit(request(json!({"id": "v1", "type": "kamyon"}))).unwrap().job_id;

        assert_eq!(controller.execute(id).await.unwrap(), ExecuteOutcome::Completed);

        let view = controller.poll(id).unwrap();
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.progress, 100);
        assert!(view.processing_time_seconds.is_some());
        let result = view.result.unwrap();
        let route = &result.routes[0];
        assert_eq!(route.toll_cost, 50.0);
        assert_eq!(route.highway_cost, 0.0);
        assert_eq!(route.toll_crossings.len(), 1);
        assert_eq!(route.toll_crossings[0].corridor_name, "BridgeX");
        assert_eq!(route.total_cost, 175.0);

        let summary = result.summary.unwrap();
        assert_eq!(summary.total_toll_cost, 50.0);
        assert_eq!(summary.total_cost, 175.0);
    }

    #[tokio::test]
    async fn test_motorway_usage_folded_into_toll_cost() {
        let store = Arc::new(InMemoryJobStore::new(None));
        let index = CorridorIndex::new(vec![bridge_x()])
            .unwrap()
            .with_highways(vec![highway_h()])
            .unwrap();
        let output: SolverOutput = serde_json::from_value(json!({
            "routes": [{
                "vehicle_id": "v1",
                "depot_id": "d1",
                "stops": [{"customer_id": "c1", "location": {"lat": 40.0, "lng": 30.4}}],
                "fuel_cost": 100.0,
                "distance_cost": 20.0,
                "fixed_cost": 5.0,
                "total_cost": 125.0
            }]
        }))
        .unwrap();
        let controller = JobController::new(
            store.clone(),
            Arc::new(ScriptedSolver { output: Some(output) }),
            CorridorMatcher::new(Arc::new(index)),
        );
        let request: OptimizationRequest = serde_json::from_value(json!({
            "depots": [{"id": "d1", "location": {"lat": 40.0, "lng": 30.0}}],
            "vehicles": [{"id": "v1"}],
            "customers": [{"id": "c1", "location": {"lat": 40.0, "lng": 30.4}}]
        }))
        .unwrap();
        let id = controller.submit(request).unwrap().job_id;
        controller.execute(id).await.unwrap();

        let result = controller.poll(id).unwrap().result.unwrap();
        let route = &result.routes[0];
        assert!(route.toll_crossings.is_empty());
        assert_eq!(route.highway_usage.len(), 1);
        assert_eq!(route.highway_usage[0].entry, "West");
        assert_eq!(route.highway_usage[0].exit, "East");
        assert_eq!(route.highway_cost, 90.0);
        assert_eq!(route.toll_cost, 90.0);
        assert_eq!(route.total_cost, 215.0);
        assert_eq!(result.summary.unwrap().total_toll_cost, 90.0);
    }

    #[tokio::test]
    async fn test_missing_vehicle_type_uses_default_class() {
        let (controller, _) = controller(Some(crossing_output()));
        let id = controller.submit(request(json!({"id": "v1"}))).unwrap().job_id;
        controller.execute(id).await.unwrap();
        let result = controller.poll(id).unwrap().result.unwrap();
        assert_eq!(result.routes[0].toll_crossings[0].vehicle_class, VehicleClass::Truck);
    }

    #[tokio::test]
    async fn test_unknown_class_fails_job() {
        let (controller, _) = controller(Some(crossing_output()));
        // BridgeX only tariffs trucks.
        let id = controller.submit(request(json!({"id": "v1", "type": "car"}))).unwrap().job_id;

        assert_eq!(controller.execute(id).await.unwrap(), ExecuteOutcome::Failed);
        let view = controller.poll(id).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.unwrap().contains("unknown vehicle class"));
        assert!(view.result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_depot_fails_job() {
        let mut output = crossing_output();
        output.routes[0].depot_id = Some("nowhere".into());
        let (controller, _) = controller(Some(output));
        let id = controller.submit(request(json!({"id": "v1"}))).unwrap().job_id;

        assert_eq!(controller.execute(id).await.unwrap(), ExecuteOutcome::Failed);
        assert!(controller.poll(id).unwrap().error.unwrap().contains("nowhere"));
    }

    #[tokio::test]
    async fn test_reported_failure() {
        let output: SolverOutput = serde_json::from_value(json!({
            "success": false,
            "error": "no feasible solution",
            "routes": []
        }))
        .unwrap();
        let (controller, _) = controller(Some(output));
        let id = controller.submit(request(json!({"id": "v1"}))).unwrap().job_id;

        assert_eq!(controller.execute(id).await.unwrap(), ExecuteOutcome::Failed);
        assert!(controller.poll(id).unwrap().error.unwrap().contains("no feasible solution"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let (controller, _) = controller(None);
        let id = controller.submit(request(json!({"id": "v1"}))).unwrap().job_id;

        assert_eq!(controller.execute(id).await.unwrap(), ExecuteOutcome::Failed);
        let view = controller.poll(id).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.unwrap().contains("solver exploded"));
    }

    #[tokio::test]
    async fn test_execute_twice_claims_once() {
        let (controller, _) = controller(Some(crossing_output()));
        let id = controller.submit(request(json!({"id": "v1"}))).unwrap().job_id;
        assert_eq!(controller.execute(id).await.unwrap(), ExecuteOutcome::Completed);
        assert_eq!(controller.execute(id).await.unwrap(), ExecuteOutcome::NotClaimed);
        assert!(matches!(controller.execute(Uuid::new_v4()).await, Err(JobError::NotFound(_))));
    }

    #[test]
    fn test_cancel() {
        let (controller, _) = controller(None);
        let id = controller.submit(request(json!({"id": "v1"}))).unwrap().job_id;
        let view = controller.cancel(id).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.as_deref(), Some(CANCELLED_MESSAGE));
        assert!(matches!(controller.cancel(id), Err(JobError::InvalidTransition { .. })));
    }

    #[test]
    fn test_route_coordinates_prefers_geometry() {
        let req = request(json!({"id": "v1"}));
        let mut route = crossing_output().routes.remove(0);
        route.geometry = Some("_p~iF~ps|U_ulLnnqC_mqNvxq`@".into());
        assert_eq!(route_coordinates(&req, &route).unwrap().len(), 3);

        route.geometry = Some("garbage\u{1}".into());
        let points = route_coordinates(&req, &route).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], points[2]);
    }

    #[test]
    fn test_route_coordinates_without_depot_id() {
        let mut req = request(json!({"id": "v1"}));
        let mut route = crossing_output().routes.remove(0);
        route.depot_id = None;
        assert_eq!(route_coordinates(&req, &route).unwrap().len(), 3);

        let second = req.depots[0].clone();
        req.depots.push(second);
        assert_eq!(route_coordinates(&req, &route).unwrap().len(), 1);
    }

    #[test]
    fn test_fold_summary_builds_missing_summary() {
        let mut output = crossing_output();
        output.summary = None;
        output.routes[0].distance_km = 42.25;
        fold_summary(&mut output);
        let summary = output.summary.unwrap();
        assert_eq!(summary.total_routes, 1);
        assert_eq!(summary.total_distance_km, 42.25);
        assert_eq!(summary.total_cost, 125.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.005_1), 10.01);
        assert_eq!(round2(3.0), 3.0);
    }
}
