//! Error types for the route planner.

use thiserror::Error;

use crate::traits::StopId;

/// Errors surfaced by the planner.
///
/// Only malformed requests reach callers of the optimizer. Missing table
/// entries and thin training data are handled by falling back, never by
/// returning one of these.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("request contains no stops")]
    EmptyRequest,

    #[error("vehicle count must be at least 1, got {0}")]
    InvalidVehicleCount(usize),

    #[error("duplicate stop id {0}")]
    DuplicateStop(StopId),

    #[error("stop {id} has invalid coordinates ({lat}, {lng})")]
    InvalidCoordinates { id: StopId, lat: f64, lng: f64 },

    #[error("stop {0} is not a valid action from the current state")]
    InvalidAction(StopId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;
