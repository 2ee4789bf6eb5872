//! Test fixtures for route-rl-planner.
//!
//! Provides:
//! - Named delivery points around Lima, Peru
//! - Builders turning them into stops

pub mod lima_locations;

pub use lima_locations::*;
