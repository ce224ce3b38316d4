// Geodesic Circle Generator
// Radius around a center -> closed polygon ring, using a local flat-earth approximation.
// Accuracy degrades past tens of kilometers and near the poles; no great-circle correction.

use serde_json::{json, Value};
use std::f64::consts::PI;

use crate::error::GeometryError;

/// Earth radius used by the local approximation (WGS84 semi-major axis, m).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

pub const DEFAULT_STEPS: usize = 128;

/// Above this absolute latitude the longitude scaling blows up.
pub const DEFAULT_POLAR_LIMIT_DEG: f64 = 85.0;

/// (longitude, latitude) in degrees.
pub type LonLat = (f64, f64);

/// Bring a longitude back into [-180, 180].
pub fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    points: Vec<LonLat>,
    polar_distortion: bool,
}

impl Ring {
    /// Vertices, first repeated as last.
    pub fn points(&self) -> &[LonLat] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Center latitude exceeded the polar safety limit; longitudes are unreliable.
    pub fn polar_distortion(&self) -> bool {
        self.polar_distortion
    }

    pub fn into_points(self) -> Vec<LonLat> {
        self.points
    }

    /// GeoJSON Polygon geometry with this ring as its only (outer) ring.
    pub fn to_geojson(&self) -> Value {
        let coords: Vec<[f64; 2]> = self.points.iter().map(|&(lon, lat)| [lon, lat]).collect();
        json!({
            "type": "Polygon",
            "coordinates": [coords],
        })
    }
}

/// Ring of `steps` vertices at `radius_m` around `center`, closed.
pub fn ring(center: LonLat, radius_m: f64, steps: usize) -> Result<Ring, GeometryError> {
    ring_with_limit(center, radius_m, steps, DEFAULT_POLAR_LIMIT_DEG)
}

pub fn ring_with_limit(
    center: LonLat,
    radius_m: f64,
    steps: usize,
    polar_limit_deg: f64,
) -> Result<Ring, GeometryError> {
    if steps < 3 {
        return Err(GeometryError::InvalidArgument(format!(
            "ring needs at least 3 steps, got {steps}"
        )));
    }
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(GeometryError::InvalidArgument(format!(
            "radius must be finite and non-negative, got {radius_m}"
        )));
    }
    let (lon, lat) = center;
    if !lon.is_finite() || !lat.is_finite() {
        return Err(GeometryError::InvalidArgument(format!(
            "center must be finite, got ({lon}, {lat})"
        )));
    }

    let polar_distortion = lat.abs() > polar_limit_deg;
    if polar_distortion {
        tracing::warn!(
            lat,
            polar_limit_deg,
            "ring center beyond polar limit, longitude offsets are distorted"
        );
    }

    let cos_lat = (lat * PI / 180.0).cos();
    let mut points = Vec::with_capacity(steps + 1);
    for i in 0..steps {
        let theta = i as f64 / steps as f64 * 2.0 * PI;
        let dx = radius_m * theta.cos();
        let dy = radius_m * theta.sin();
        let d_lon = dx / (EARTH_RADIUS_M * cos_lat) * 180.0 / PI;
        let d_lat = dy / EARTH_RADIUS_M * 180.0 / PI;
        points.push((lon + d_lon, lat + d_lat));
    }
    points.push(points[0]);

    Ok(Ring {
        points,
        polar_distortion,
    })
}

/// Distance in meters under the same flat metric `ring` uses.
pub fn flat_distance_m(center: LonLat, point: LonLat) -> f64 {
    let cos_lat = (center.1 * PI / 180.0).cos();
    let dx = (point.0 - center.0) * PI / 180.0 * EARTH_RADIUS_M * cos_lat;
    let dy = (point.1 - center.1) * PI / 180.0 * EARTH_RADIUS_M;
    (dx * dx + dy * dy).sqrt()
}

// =============================================================================
// TESTS
// =============================================================================
