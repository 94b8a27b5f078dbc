//! Per-kilometre motorway tariffs.
//!
//! A motorway is a chain of toll gates with kilometre markers. A route uses
//! it when it passes near at least two gates; the charge is the marker
//! distance between the first and last gate passed, times the class tariff.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tolls::corridor::{LatLng, TollError, TollResult, VehicleClass};
use crate::tolls::geometry::haversine_m;

/// Default radius around a gate within which a route point counts as passing it.
pub const DEFAULT_GATE_RADIUS_KM: f64 = 8.0;

/// A toll gate on a motorway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TollGate {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Kilometre marker from the start of the motorway.
    pub km: f64,
}

impl TollGate {
    pub fn location(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// A motorway charged by distance between gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TollHighway {
    pub code: String,
    pub name: String,
    pub gates: Vec<TollGate>,
    pub cost_per_km: BTreeMap<VehicleClass, f64>,
}

impl TollHighway {
    /// "O-1 TEM Otoyolu".
    pub fn label(&self) -> String {
        format!("{} {}", self.code, self.name)
    }

    pub fn validate(&self) -> TollResult<()> {
        let invalid = |reason: String| TollError::InvalidCorridor {
            name: self.label(),
            reason,
        };

        if self.gates.len() < 2 {
            return Err(invalid(format!("needs at least 2 gates, has {}", self.gates.len())));
        }
        if let Some(gate) = self
            .gates
            .iter()
            .find(|g| !g.km.is_finite() || g.km < 0.0)
        {
            return Err(invalid(format!("gate '{}' has invalid km marker {}", gate.name, gate.km)));
        }
        if let Some((class, cost)) = self
            .cost_per_km
            .iter()
            .find(|(_, cost)| !cost.is_finite() || **cost < 0.0)
        {
            return Err(invalid(format!("cost per km for {class} must be non-negative, got {cost}")));
        }
        Ok(())
    }

    pub fn cost_per_km_for(&self, class: VehicleClass) -> TollResult<f64> {
        self.cost_per_km
            .get(&class)
            .copied()
            .ok_or_else(|| TollError::UnknownVehicleClass(class.to_string()))
    }

    /// Entry and exit gates passed by `route`, in route order.
    ///
    /// Each gate counts once, at the first route point within `radius_km`.
    /// `None` unless at least two distinct gates were passed.
    pub fn entry_exit(&self, route: &[LatLng], radius_km: f64) -> Option<(&TollGate, &TollGate)> {
        let radius_m = radius_km * 1000.0;
        let mut passed: Vec<(usize, usize)> = Vec::new();

        for (point_index, point) in route.iter().enumerate() {
            for (gate_index, gate) in self.gates.iter().enumerate() {
                if passed.iter().any(|(_, g)| *g == gate_index) {
                    continue;
                }
                if haversine_m(*point, gate.location()) < radius_m {
                    passed.push((point_index, gate_index));
                }
            }
        }

        if passed.len() < 2 {
            return None;
        }
        passed.sort_by_key(|(point_index, _)| *point_index);
        let (_, entry) = passed[0];
        let (_, exit) = passed[passed.len() - 1];
        Some((&self.gates[entry], &self.gates[exit]))
    }
}

/// One charged stretch of motorway on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighwayUsage {
    pub highway: String,
    pub entry: String,
    pub exit: String,
    pub distance_km: f64,
    pub vehicle_class: VehicleClass,
    pub cost: f64,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Three gates due east of each other, roughly 17 km apart.
    pub(crate) fn highway_h() -> TollHighway {
        TollHighway {
            code: "H-1".to_string(),
            name: "Test Otoyolu".to_string(),
            gates: vec![
                TollGate { name: "West".into(), lat: 40.0, lng: 30.0, km: 0.0 },
                TollGate { name: "Middle".into(), lat: 40.0, lng: 30.2, km: 20.0 },
                TollGate { name: "East".into(), lat: 40.0, lng: 30.4, km: 45.0 },
            ],
            cost_per_km: BTreeMap::from([(VehicleClass::Truck, 2.0), (VehicleClass::Car, 1.0)]),
        }
    }

    fn route(points: &[(f64, f64)]) -> Vec<LatLng> {
        points.iter().map(|(lat, lng)| LatLng::new(*lat, *lng)).collect()
    }

    #[test]
    fn test_entry_exit_in_route_order() {
        let h = highway_h();
        let eastbound = route(&[(40.01, 29.99), (40.0, 30.2), (40.01, 30.41)]);
        let (entry, exit) = h.entry_exit(&eastbound, DEFAULT_GATE_RADIUS_KM).unwrap();
        assert_eq!((entry.name.as_str(), exit.name.as_str()), ("West", "East"));

        let westbound = route(&[(40.01, 30.41), (40.01, 29.99)]);
        let (entry, exit) = h.entry_exit(&westbound, DEFAULT_GATE_RADIUS_KM).unwrap();
        assert_eq!((entry.name.as_str(), exit.name.as_str()), ("East", "West"));
    }

    #[test]
    fn test_single_gate_is_not_usage() {
        let h = highway_h();
        let r = route(&[(40.01, 29.99), (40.5, 29.99)]);
        assert!(h.entry_exit(&r, DEFAULT_GATE_RADIUS_KM).is_none());
    }

    #[test]
    fn test_radius_bounds_detection() {
        let h = highway_h();
        // About 5.5 km north of the West and Middle gates.
        let r = route(&[(40.05, 30.0), (40.05, 30.2)]);
        assert!(h.entry_exit(&r, DEFAULT_GATE_RADIUS_KM).is_some());
        assert!(h.entry_exit(&r, 2.0).is_none());
    }

    #[test]
    fn test_validate() {
        assert!(highway_h().validate().is_ok());

        let mut short = highway_h();
        short.gates.truncate(1);
        assert!(short.validate().unwrap_err().to_string().contains("at least 2 gates"));

        let mut negative = highway_h();
        negative.cost_per_km.insert(VehicleClass::Bus, -0.5);
        assert!(negative.validate().is_err());

        let mut marker = highway_h();
        marker.gates[1].km = f64::NAN;
        assert!(marker.validate().is_err());
    }

    #[test]
    fn test_cost_per_km_lookup() {
        let h = highway_h();
        assert_eq!(h.cost_per_km_for(VehicleClass::Truck).unwrap(), 2.0);
        assert!(matches!(
            h.cost_per_km_for(VehicleClass::Bus),
            Err(TollError::UnknownVehicleClass(c)) if c == "bus"
        ));
        assert_eq!(h.label(), "H-1 Test Otoyolu");
    }
}
