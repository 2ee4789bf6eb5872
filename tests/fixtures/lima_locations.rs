//! Delivery points around Lima for realistic test fixtures.
//!
//! Coordinates are approximate district landmarks, close enough for
//! great-circle distances to behave like a real local delivery area.

#![allow(dead_code)]

use route_rl_planner::traits::Location;

/// A named point with coordinates.
#[derive(Debug, Clone)]
pub struct Place {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// Depots
// ============================================================================

pub const WAREHOUSE_CERCADO: Place = Place::new("Almacen Cercado", -12.046374, -77.042793);
pub const WAREHOUSE_ATE: Place = Place::new("Almacen Ate", -12.0262, -76.9186);

// ============================================================================
// Southern districts
// ============================================================================

pub const SOUTH: &[Place] = &[
    Place::new("Parque Kennedy", -12.1219, -77.0297),
    Place::new("Larcomar", -12.1318, -77.0307),
    Place::new("Ovalo Gutierrez", -12.1086, -77.0374),
    Place::new("Barranco Plaza", -12.1494, -77.0211),
    Place::new("Surquillo Mercado", -12.1125, -77.0231),
    Place::new("San Isidro Golf", -12.0983, -77.0366),
    Place::new("Chorrillos Malecon", -12.1681, -77.0246),
    Place::new("Surco Jockey Plaza", -12.0857, -76.9766),
];

// ============================================================================
// Northern districts
// ============================================================================

pub const NORTH: &[Place] = &[
    Place::new("Plaza Norte", -12.0067, -77.0594),
    Place::new("Mega Plaza", -11.9946, -77.0612),
    Place::new("Los Olivos Municipalidad", -11.9911, -77.0707),
    Place::new("San Martin de Porres", -12.0305, -77.0595),
    Place::new("Comas Centro", -11.9376, -77.0609),
    Place::new("Independencia Mercado", -11.9907, -77.0531),
    Place::new("Rimac Alameda", -12.0333, -77.0285),
    Place::new("Puente Piedra", -11.8667, -77.0750),
];

/// Stops with ids `first_id..` for the given places, in slice order.
pub fn stops(places: &[Place], first_id: u64) -> Vec<Location> {
    places
        .iter()
        .enumerate()
        .map(|(i, place)| Location::new(first_id + i as u64, place.lat, place.lng))
        .collect()
}

/// Every fixture place as stops with ids starting at 1.
pub fn all_stops() -> Vec<Location> {
    let places: Vec<Place> = SOUTH.iter().chain(NORTH.iter()).cloned().collect();
    stops(&places, 1)
}

/// Stops on a straight east-west line at the equator, `spacing_deg` apart,
/// listed in a zig-zag order (far, near, far, ...).
pub fn zig_zag_line(count: u64, spacing_deg: f64) -> Vec<Location> {
    let mut order: Vec<u64> = Vec::with_capacity(count as usize);
    let (mut low, mut high) = (1, count);
    while low <= high {
        order.push(high);
        if low != high {
            order.push(low);
        }
        low += 1;
        high -= 1;
    }
    order
        .into_iter()
        .map(|i| Location::new(i, 0.0, i as f64 * spacing_deg))
        .collect()
}
