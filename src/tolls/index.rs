//! Static corridor index.
//!
//! # Responsibilities
//! - Load corridor and motorway definitions (embedded catalogue or TOML file)
//! - Reject unusable definitions at construction time
//! - Answer "which corridors contain this point" without locking
//!
//! # Design Decisions
//! - Built once at startup and shared via Arc; never mutated afterwards
//! - Linear scan over bounding boxes: corridor tables are small (tens of entries)

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::tolls::corridor::{LatLng, TollCorridor, TollError, TollResult};
use crate::tolls::highway::TollHighway;

const BUILTIN_CORRIDORS: &str = include_str!("corridors.toml");

#[derive(Debug, Deserialize)]
struct CorridorFile {
    #[serde(default)]
    corridors: Vec<TollCorridor>,
    #[serde(default)]
    highways: Vec<TollHighway>,
}

/// Read-only table of paid crossings and distance-charged motorways.
#[derive(Debug, Clone)]
pub struct CorridorIndex {
    corridors: Vec<TollCorridor>,
    highways: Vec<TollHighway>,
}

impl CorridorIndex {
    /// Build an index, validating every corridor.
    pub fn new(corridors: Vec<TollCorridor>) -> TollResult<Self> {
        for corridor in &corridors {
            corridor.validate()?;
        }
        Ok(Self {
            corridors,
            highways: Vec::new(),
        })
    }

    /// Attach motorways, validating each.
    pub fn with_highways(mut self, highways: Vec<TollHighway>) -> TollResult<Self> {
        for highway in &highways {
            highway.validate()?;
        }
        self.highways = highways;
        Ok(self)
    }

    /// The catalogue compiled into the binary.
    pub fn builtin() -> TollResult<Self> {
        Self::from_toml(BUILTIN_CORRIDORS)
    }

    pub fn from_toml(content: &str) -> TollResult<Self> {
        let file: CorridorFile =
            toml::from_str(content).map_err(|e| TollError::Load(e.to_string()))?;
        Self::new(file.corridors)?.with_highways(file.highways)
    }

    /// Load from a TOML file containing `[[corridors]]` and `[[highways]]` tables.
    pub fn load(path: &Path) -> TollResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| TollError::Load(format!("{}: {}", path.display(), e)))?;
        let index = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            corridors = index.len(),
            highways = index.highways().len(),
            "Corridor table loaded"
        );
        Ok(index)
    }

    /// Every corridor whose bounding box contains `point`, in table order.
    pub fn lookup_candidates(&self, point: LatLng) -> Vec<&TollCorridor> {
        self.candidate_positions(point)
            .map(|pos| &self.corridors[pos])
            .collect()
    }

    pub(crate) fn candidate_positions(&self, point: LatLng) -> impl Iterator<Item = usize> + '_ {
        self.corridors
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.bounding_box.contains(point))
            .map(|(pos, _)| pos)
    }

    pub fn get(&self, position: usize) -> Option<&TollCorridor> {
        self.corridors.get(position)
    }

    pub fn corridors(&self) -> &[TollCorridor] {
        &self.corridors
    }

    pub fn highways(&self) -> &[TollHighway] {
        &self.highways
    }

    /// Number of corridors; motorways are counted by `highways().len()`.
    pub fn len(&self) -> usize {
        self.corridors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corridors.is_empty()
    }
}
