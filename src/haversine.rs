//! Haversine distance matrix provider.
//!
//! Uses great-circle distance between stops. Ignores roads but needs no
//! external service, so it is always available.

use crate::matrix::DistanceMatrix;
use crate::traits::{DistanceMatrixProvider, Location};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (lat, lng) points in kilometers.
///
/// The haversine term is clamped to [0, 1] before `asin`, so coincident and
/// antipodal points never produce NaN.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    if lat1 == lat2 && lng1 == lng2 {
        return 0.0;
    }

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineMatrix;

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, depot: (f64, f64), stops: &[Location]) -> DistanceMatrix {
        DistanceMatrix::build(depot, stops, haversine_km)
    }
}
