//! Route geometry helpers.
//!
//! Solvers return route traces as encoded polylines (Google / ORS format,
//! precision 1e5). The matcher works on plain coordinate sequences.

use geo::{Distance, Haversine, Point};

use crate::tolls::corridor::{LatLng, TollError, TollResult};

const POLYLINE_PRECISION: f64 = 1e5;

/// Decode an encoded polyline into coordinates.
pub fn decode_polyline(encoded: &str) -> TollResult<Vec<LatLng>> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        lng += next_delta(bytes, &mut index)?;
        points.push(LatLng::new(
            lat as f64 / POLYLINE_PRECISION,
            lng as f64 / POLYLINE_PRECISION,
        ));
    }

    Ok(points)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> TollResult<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*index).ok_or(TollError::InvalidPolyline(*index))?;
        if !(63..127).contains(&byte) || shift > 30 {
            return Err(TollError::InvalidPolyline(*index));
        }
        *index += 1;

        let chunk = (byte - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}

/// Great-circle distance in metres.
pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    Haversine.distance(Point::new(a.lng, a.lat), Point::new(b.lng, b.lat))
}

/// Direction vector from `from` to `to` on a local equirectangular plane.
///
/// Longitude deltas are scaled by the cosine of the mean latitude so that
/// east/west and north/south components are comparable.
pub fn local_vector(from: LatLng, to: LatLng) -> (f64, f64) {
    let mean_lat = ((from.lat + to.lat) / 2.0).to_radians();
    ((to.lng - from.lng) * mean_lat.cos(), to.lat - from.lat)
}

/// Cosine of the angle between two vectors, `None` when either is zero-length.
pub fn cosine(a: (f64, f64), b: (f64, f64)) -> Option<f64> {
    let norm = (a.0.hypot(a.1)) * (b.0.hypot(b.1));
    if norm <= f64::EPSILON {
        return None;
    }
    Some((a.0 * b.0 + a.1 * b.1) / norm)
}
