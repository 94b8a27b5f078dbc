//! Corridor crossing detection.
//!
//! # Algorithm
//! ```text
//! for each segment (p[i], p[i+1]) of the route:
//!     candidates = index(p[i]) ∪ index(p[i+1])
//!     keep candidates whose bbox intersects the segment bbox
//!     skip corridors already charged on this route
//!     one-way corridor: compare checkpoint heading with segment heading
//!         against  → not a charged crossing (a later segment may still charge it)
//!         with / undetermined → charged
//!     record attribution at the segment endpoint nearest the corridor
//!
//! for each motorway:
//!     gates passed = gates within the radius of any route point
//!     ≥ 2 gates → charge |km(exit) - km(entry)| × cost per km
//! ```
//!
//! # Design Decisions
//! - Bounding-box overlap only; corridors are small and localised
//! - At most one attribution per corridor per route
//! - Undetermined direction charges: undercharging is the worse failure

use std::collections::BTreeSet;
use std::sync::Arc;

use geo::{BoundingRect, Intersects, Line};
use serde::{Deserialize, Serialize};

use crate::tolls::corridor::{CorridorKind, LatLng, TollCorridor, TollResult, VehicleClass};
use crate::tolls::geometry::{cosine, haversine_m, local_vector};
use crate::tolls::highway::{HighwayUsage, DEFAULT_GATE_RADIUS_KM};
use crate::tolls::index::CorridorIndex;

/// Default |cos θ| below which a crossing direction is considered unknown.
pub const DEFAULT_DIRECTION_TOLERANCE: f64 = 0.2;

/// One charged crossing on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TollAttribution {
    pub corridor_name: String,
    pub kind: CorridorKind,
    pub vehicle_class: VehicleClass,
    pub cost: f64,
    /// Index into the matched coordinate sequence.
    pub crossing_index: usize,
}

/// Crossings in route order plus their sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TollReport {
    pub attributions: Vec<TollAttribution>,
    pub total: f64,
}

impl TollReport {
    pub fn is_empty(&self) -> bool {
        self.attributions.is_empty()
    }
}

/// Everything a route pays: corridor crossings plus motorway stretches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTolls {
    pub crossings: TollReport,
    pub highway_usage: Vec<HighwayUsage>,
    pub highway_total: f64,
}

impl RouteTolls {
    pub fn total(&self) -> f64 {
        self.crossings.total + self.highway_total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    With,
    Against,
    Undetermined,
}

/// Matches route coordinates against the corridor index.
#[derive(Debug, Clone)]
pub struct CorridorMatcher {
    index: Arc<CorridorIndex>,
    direction_tolerance: f64,
    gate_radius_km: f64,
}

impl CorridorMatcher {
    pub fn new(index: Arc<CorridorIndex>) -> Self {
        Self {
            index,
            direction_tolerance: DEFAULT_DIRECTION_TOLERANCE,
            gate_radius_km: DEFAULT_GATE_RADIUS_KM,
        }
    }

    pub fn with_direction_tolerance(mut self, tolerance: f64) -> Self {
        self.direction_tolerance = tolerance;
        self
    }

    pub fn with_gate_radius_km(mut self, radius_km: f64) -> Self {
        self.gate_radius_km = radius_km;
        self
    }

    pub fn index(&self) -> &CorridorIndex {
        &self.index
    }

    /// Determine charged crossings for a route driven by `class`.
    ///
    /// Fails with `UnknownVehicleClass` when a crossed corridor has no tariff
    /// for `class`.
    pub fn match_route(&self, route: &[LatLng], class: VehicleClass) -> TollResult<TollReport> {
        let mut charged = vec![false; self.index.len()];
        let mut report = TollReport::default();

        for (i, pair) in route.windows(2).enumerate() {
            let (start, end) = (pair[0], pair[1]);
            let segment = Line::new(start.to_coord(), end.to_coord()).bounding_rect();

            let candidates: BTreeSet<usize> = self
                .index
                .candidate_positions(start)
                .chain(self.index.candidate_positions(end))
                .collect();

            for pos in candidates {
                if charged[pos] {
                    continue;
                }
                let Some(corridor) = self.index.get(pos) else {
                    continue;
                };
                if !corridor.bounding_box.to_rect().intersects(&segment) {
                    continue;
                }

                if !corridor.bidirectional {
                    let heading = self.heading(corridor, start, end);
                    if heading == Heading::Against {
                        tracing::trace!(
                            corridor = %corridor.name,
                            segment = i,
                            "Crossing against the charged direction"
                        );
                        continue;
                    }
                }

                let cost = corridor.cost_for(class)?;
                charged[pos] = true;
                report.total += cost;
                report.attributions.push(TollAttribution {
                    corridor_name: corridor.name.clone(),
                    kind: corridor.kind,
                    vehicle_class: class,
                    cost,
                    crossing_index: nearest_endpoint(corridor, i, start, end),
                });
            }
        }

        Ok(report)
    }

    /// Motorway stretches driven on `route`, in table order.
    pub fn match_highways(&self, route: &[LatLng], class: VehicleClass) -> TollResult<Vec<HighwayUsage>> {
        let mut usage = Vec::new();
        for highway in self.index.highways() {
            let Some((entry, exit)) = highway.entry_exit(route, self.gate_radius_km) else {
                continue;
            };
            let distance_km = (exit.km - entry.km).abs();
            if distance_km <= 0.0 {
                continue;
            }
            let cost = distance_km * highway.cost_per_km_for(class)?;
            usage.push(HighwayUsage {
                highway: highway.label(),
                entry: entry.name.clone(),
                exit: exit.name.clone(),
                distance_km: round_to(distance_km, 1),
                vehicle_class: class,
                cost: round_to(cost, 2),
            });
        }
        Ok(usage)
    }

    /// Corridor crossings and motorway usage for one route.
    pub fn price_route(&self, route: &[LatLng], class: VehicleClass) -> TollResult<RouteTolls> {
        let crossings = self.match_route(route, class)?;
        let highway_usage = self.match_highways(route, class)?;
        let highway_total = round_to(highway_usage.iter().map(|u| u.cost).sum(), 2);
        Ok(RouteTolls {
            crossings,
            highway_usage,
            highway_total,
        })
    }

    fn heading(&self, corridor: &TollCorridor, start: LatLng, end: LatLng) -> Heading {
        let (first, last) = corridor.heading();
        let along = local_vector(first, last);
        let travel = local_vector(start, end);

        match cosine(along, travel) {
            Some(cos) if cos.abs() < self.direction_tolerance => Heading::Undetermined,
            Some(cos) if cos > 0.0 => Heading::With,
            Some(_) => Heading::Against,
            None => Heading::Undetermined,
        }
    }
}

fn nearest_endpoint(corridor: &TollCorridor, i: usize, start: LatLng, end: LatLng) -> usize {
    let centre = corridor.centre();
    if haversine_m(end, centre) < haversine_m(start, centre) {
        i + 1
    } else {
        i
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
