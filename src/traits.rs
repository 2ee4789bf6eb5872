//! Core domain types and traits for the route planner.
//!
//! Route construction is split into two seams: a distance provider that turns
//! a location set into a [`DistanceMatrix`], and a [`RoutePlanner`] that orders
//! the stops of one vehicle. The learned policy and the greedy heuristic are
//! both planners, so the optimizer can swap one for the other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matrix::DistanceMatrix;

/// Identifier of a delivery stop, unique within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopId(pub u64);

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A delivery stop with coordinates in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    id: StopId,
    lat: f64,
    lng: f64,
}

impl Location {
    pub fn new(id: u64, lat: f64, lng: f64) -> Self {
        Self {
            id: StopId(id),
            lat,
            lng,
        }
    }

    pub fn id(&self) -> StopId {
        self.id
    }

    /// Location coordinates (lat, lng).
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }

    /// Whether both coordinates are finite and inside the valid degree ranges.
    pub fn has_valid_coords(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A node of the route graph: the shared depot or one of the stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Node {
    Depot,
    Stop(StopId),
}

/// Provides a distance matrix (kilometers) for a depot and a set of stops.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, depot: (f64, f64), stops: &[Location]) -> DistanceMatrix;
}

/// Which planner produced a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    Learned,
    Fallback,
}

impl fmt::Display for PlannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerKind::Learned => write!(f, "learned"),
            PlannerKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// Produces a visiting order for every stop in a matrix, starting at the depot.
///
/// Returning `None` means the planner has nothing usable for this stop set and
/// the caller should try the next planner.
pub trait RoutePlanner: Send + Sync {
    fn kind(&self) -> PlannerKind;

    fn plan(&self, matrix: &DistanceMatrix) -> Option<Vec<StopId>>;
}

/// Round coordinates to 1e-6 degrees so they can be compared and hashed.
pub(crate) fn location_key(location: (f64, f64)) -> (i64, i64) {
    (
        (location.0 * 1e6).round() as i64,
        (location.1 * 1e6).round() as i64,
    )
}
