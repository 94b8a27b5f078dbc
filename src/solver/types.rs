//! Solver wire types and error definitions.
//!
//! Every payload struct keeps unrecognised fields in `extra` so requests are
//! stored and forwarded verbatim and solver results survive augmentation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tolls::{HighwayUsage, LatLng, TollAttribution, TollResult, VehicleClass};

/// Errors surfaced by a solver backend.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The solver did not answer within the deadline.
    #[error("solver timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure talking to the solver.
    #[error("solver unreachable: {0}")]
    Transport(String),

    /// The solver answered with a non-success status.
    #[error("solver rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The solver reported a failure in its response body.
    #[error("solver reported failure: {0}")]
    Reported(String),

    /// The response could not be decoded.
    #[error("malformed solver output: {0}")]
    Malformed(String),
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Optimization request as submitted by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    #[serde(default)]
    pub depots: Vec<Depot>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub constraints: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OptimizationRequest {
    pub fn depot(&self, id: &str) -> Option<&Depot> {
        self.depots.iter().find(|d| d.id == id)
    }

    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Depot {
    pub id: String,
    pub location: LatLng,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    #[serde(rename = "type", alias = "vehicle_type", default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleType>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub location: LatLng,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Vehicle type as found in fleet records: either a fleet type code or a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VehicleType {
    Code(u8),
    Named(String),
}

impl VehicleType {
    /// Tariff class for this vehicle.
    ///
    /// Fleet codes: 0 van-sized truck, 1-2 rigid trucks, 3 articulated
    /// truck, 4 truck with trailer.
    pub fn toll_class(&self) -> TollResult<VehicleClass> {
        match self {
            VehicleType::Code(0..=2) => Ok(VehicleClass::Truck),
            VehicleType::Code(3 | 4) => Ok(VehicleClass::ArticulatedTruck),
            VehicleType::Code(code) => Err(crate::tolls::TollError::UnknownVehicleClass(
                format!("fleet code {code}"),
            )),
            VehicleType::Named(name) => VehicleClass::parse_vehicle_type(name),
        }
    }
}

/// What the solver hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub routes: Vec<SolvedRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ResultSummary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single vehicle tour with its cost breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvedRoute {
    pub vehicle_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depot_id: Option<String>,
    #[serde(default)]
    pub stops: Vec<RouteStop>,
    /// Encoded polyline of the driven path, when the solver provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default)]
    pub fuel_cost: f64,
    #[serde(default)]
    pub distance_cost: f64,
    #[serde(default)]
    pub fixed_cost: f64,
    #[serde(default)]
    pub toll_cost: f64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub toll_crossings: Vec<TollAttribution>,
    /// Per-kilometre motorway charges, included in `toll_cost`.
    #[serde(default)]
    pub highway_cost: f64,
    #[serde(default)]
    pub highway_usage: Vec<HighwayUsage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub location: LatLng,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Totals across all routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    #[serde(default)]
    pub total_routes: usize,
    #[serde(default)]
    pub total_distance_km: f64,
    #[serde(default)]
    pub total_fuel_cost: f64,
    #[serde(default)]
    pub total_distance_cost: f64,
    #[serde(default)]
    pub total_fixed_cost: f64,
    #[serde(default)]
    pub total_toll_cost: f64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
