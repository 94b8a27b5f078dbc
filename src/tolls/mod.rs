//! Toll attribution subsystem.
//!
//! # Data Flow
//! ```text
//! corridors.toml (embedded) or tolls.corridors_path
//!     → index.rs (parse, validate, freeze)
//!     → Arc<CorridorIndex> shared with the matcher
//!
//! Solved route (stops or encoded geometry)
//!     → geometry.rs (decode polyline)
//!     → matcher.rs (segment scan, direction check, tariff lookup)
//!     → highway.rs (gates passed, km between entry and exit)
//!     → RouteTolls { crossings, highway_usage, highway_total }
//! ```
//!
//! # Design Decisions
//! - Index is immutable after startup; reads never lock
//! - Matching is a pure function of (route, vehicle class, index)
//! - Missing tariffs are errors, never silently zero

pub mod corridor;
pub mod geometry;
pub mod highway;
pub mod index;
pub mod matcher;

pub use corridor::{BoundingBox, CorridorKind, LatLng, TollCorridor, TollError, TollResult, VehicleClass};
pub use highway::{HighwayUsage, TollGate, TollHighway};
pub use index::CorridorIndex;
pub use matcher::{CorridorMatcher, RouteTolls, TollAttribution, TollReport};
