//! Corridor definitions and toll error types.

use std::collections::BTreeMap;

use geo::{coord, Coord, Rect};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Errors raised while building the corridor index or matching a route.
#[derive(Debug, Error)]
pub enum TollError {
    /// The corridor table is not usable (fatal at startup).
    #[error("invalid corridor '{name}': {reason}")]
    InvalidCorridor { name: String, reason: String },

    /// A corridor has no tariff for the requested vehicle class, or the
    /// vehicle type could not be mapped to a class at all.
    #[error("unknown vehicle class '{0}'")]
    UnknownVehicleClass(String),

    /// Encoded route geometry could not be decoded.
    #[error("invalid polyline at byte {0}")]
    InvalidPolyline(usize),

    /// The corridor file could not be read or parsed.
    #[error("corridor table: {0}")]
    Load(String),
}

/// Result type for toll operations.
pub type TollResult<T> = Result<T, TollError>;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Planar coordinate with longitude on the x axis.
    pub fn to_coord(self) -> Coord<f64> {
        coord! { x: self.lng, y: self.lat }
    }
}

/// Axis-aligned box around a corridor, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Inclusive point containment.
    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.min_lat <= self.max_lat && self.min_lng <= self.max_lng)
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lng, y: self.min_lat },
            coord! { x: self.max_lng, y: self.max_lat },
        )
    }
}

/// Kind of paid infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CorridorKind {
    Bridge,
    Tunnel,
    HighwayBridge,
}

/// Tariff category used by the toll operators.
///
/// Parsing accepts the canonical names as well as the Turkish fleet
/// vocabulary found in vehicle records ("tir", "kamyon", ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive)]
pub enum VehicleClass {
    #[strum(to_string = "car", serialize = "otomobil", serialize = "automobile")]
    Car,
    #[strum(
        to_string = "minibus",
        serialize = "minibüs",
        serialize = "panelvan",
        serialize = "van"
    )]
    Minibus,
    #[strum(to_string = "bus", serialize = "otobus", serialize = "otobüs")]
    Bus,
    #[strum(to_string = "truck", serialize = "kamyon", serialize = "kamyonet")]
    Truck,
    #[serde(alias = "tir", alias = "articulated_truck")]
    #[strum(
        to_string = "articulated-truck",
        serialize = "articulated_truck",
        serialize = "tir",
        serialize = "tır",
        serialize = "dorseli",
        serialize = "cekici",
        serialize = "çekici"
    )]
    ArticulatedTruck,
}

impl VehicleClass {
    /// Map a free-form vehicle type onto a tariff class.
    pub fn parse_vehicle_type(raw: &str) -> TollResult<Self> {
        raw.trim()
            .parse()
            .map_err(|_| TollError::UnknownVehicleClass(raw.to_string()))
    }
}

/// A paid bridge, tunnel or highway crossing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TollCorridor {
    pub name: String,
    pub kind: CorridorKind,
    /// Entry/exit geometry. For one-way corridors the order is the charged direction.
    pub checkpoints: Vec<LatLng>,
    #[serde(rename = "bbox")]
    pub bounding_box: BoundingBox,
    pub bidirectional: bool,
    #[serde(rename = "costs")]
    pub cost_by_vehicle_class: BTreeMap<VehicleClass, f64>,
}

impl TollCorridor {
    /// Check the structural invariants of a corridor definition.
    pub fn validate(&self) -> TollResult<()> {
        let invalid = |reason: String| TollError::InvalidCorridor {
            name: self.name.clone(),
            reason,
        };

        if self.checkpoints.len() < 2 {
            return Err(invalid(format!(
                "needs at least 2 checkpoints, has {}",
                self.checkpoints.len()
            )));
        }
        if self.bounding_box.is_degenerate() {
            return Err(invalid("bounding box has min > max".to_string()));
        }
        if let Some(outside) = self
            .checkpoints
            .iter()
            .find(|cp| !self.bounding_box.contains(**cp))
        {
            return Err(invalid(format!(
                "checkpoint ({}, {}) lies outside the bounding box",
                outside.lat, outside.lng
            )));
        }
        if let Some((class, cost)) = self
            .cost_by_vehicle_class
            .iter()
            .find(|(_, cost)| !cost.is_finite() || **cost < 0.0)
        {
            return Err(invalid(format!("cost for {class} must be non-negative, got {cost}")));
        }
        Ok(())
    }

    /// Tariff for the given class.
    pub fn cost_for(&self, class: VehicleClass) -> TollResult<f64> {
        self.cost_by_vehicle_class
            .get(&class)
            .copied()
            .ok_or_else(|| TollError::UnknownVehicleClass(class.to_string()))
    }

    /// Mean of the checkpoints.
    pub fn centre(&self) -> LatLng {
        let n = self.checkpoints.len().max(1) as f64;
        let (lat, lng) = self
            .checkpoints
            .iter()
            .fold((0.0, 0.0), |(lat, lng), cp| (lat + cp.lat, lng + cp.lng));
        LatLng::new(lat / n, lng / n)
    }

    /// Vector from the first to the last checkpoint.
    pub fn heading(&self) -> (LatLng, LatLng) {
        let first = self.checkpoints.first().copied().unwrap_or_else(|| self.centre());
        let last = self.checkpoints.last().copied().unwrap_or_else(|| self.centre());
        (first, last)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn bridge_x() -> TollCorridor {
        TollCorridor {
            name: "BridgeX".to_string(),
            kind: CorridorKind::Bridge,
            checkpoints: vec![LatLng::new(40.02, 29.02), LatLng::new(40.08, 29.08)],
            bounding_box: BoundingBox {
                min_lat: 40.0,
                max_lat: 40.1,
                min_lng: 29.0,
                max_lng: 29.1,
            },
            bidirectional: true,
            cost_by_vehicle_class: BTreeMap::from([(VehicleClass::Truck, 50.0)]),
        }
    }

    #[test]
    fn test_vehicle_class_aliases() {
        assert_eq!(VehicleClass::parse_vehicle_type("TIR").unwrap(), VehicleClass::ArticulatedTruck);
        assert_eq!(VehicleClass::parse_vehicle_type("kamyon").unwrap(), VehicleClass::Truck);
        assert_eq!(VehicleClass::parse_vehicle_type(" Bus ").unwrap(), VehicleClass::Bus);
        assert_eq!(
            VehicleClass::parse_vehicle_type("articulated-truck").unwrap(),
            VehicleClass::ArticulatedTruck
        );
        assert!(matches!(
            VehicleClass::parse_vehicle_type("hovercraft"),
            Err(TollError::UnknownVehicleClass(v)) if v == "hovercraft"
        ));
    }

    #[test]
    fn test_vehicle_class_display() {
        assert_eq!(VehicleClass::ArticulatedTruck.to_string(), "articulated-truck");
        assert_eq!(VehicleClass::Car.to_string(), "car");
    }

    #[test]
    fn test_validate_rejects_single_checkpoint() {
        let mut corridor = bridge_x();
        corridor.checkpoints.truncate(1);
        let err = corridor.validate().unwrap_err();
        assert!(err.to_string().contains("at least 2 checkpoints"));
    }

    #[test]
    fn test_validate_rejects_degenerate_bbox() {
        let mut corridor = bridge_x();
        corridor.bounding_box.min_lng = 29.2;
        assert!(corridor.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_checkpoint_outside_bbox() {
        let mut corridor = bridge_x();
        corridor.checkpoints.push(LatLng::new(41.0, 29.05));
        let err = corridor.validate().unwrap_err();
        assert!(err.to_string().contains("outside the bounding box"));
    }

    #[test]
    fn test_validate_rejects_negative_cost() {
        let mut corridor = bridge_x();
        corridor.cost_by_vehicle_class.insert(VehicleClass::Car, -1.0);
        assert!(corridor.validate().is_err());
    }

    #[test]
    fn test_cost_lookup() {
        let corridor = bridge_x();
        assert_eq!(corridor.cost_for(VehicleClass::Truck).unwrap(), 50.0);
        assert!(matches!(
            corridor.cost_for(VehicleClass::Car),
            Err(TollError::UnknownVehicleClass(_))
        ));
    }
}
