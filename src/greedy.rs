//! Nearest-neighbor fallback planner.
//!
//! Starting at the depot, always visit the closest unvisited stop. Ties go to
//! the lowest stop id. No learning and no randomness, so it produces the same
//! complete route for the same input every time.

use crate::matrix::DistanceMatrix;
use crate::traits::{Node, PlannerKind, RoutePlanner, StopId};

#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborPlanner;

impl NearestNeighborPlanner {
    /// Build the nearest-neighbor order for every stop in `matrix`.
    pub fn route(matrix: &DistanceMatrix) -> Vec<StopId> {
        let mut remaining = matrix.stop_ids();
        remaining.sort();

        let mut order = Vec::with_capacity(remaining.len());
        let mut current = Node::Depot;

        while !remaining.is_empty() {
            let mut best_idx = 0;
            let mut best_dist = f64::INFINITY;
            for (idx, &id) in remaining.iter().enumerate() {
                let d = matrix.between(current, Node::Stop(id));
                if d < best_dist {
                    best_idx = idx;
                    best_dist = d;
                }
            }
            let next = remaining.remove(best_idx);
            order.push(next);
            current = Node::Stop(next);
        }

        order
    }
}

impl RoutePlanner for NearestNeighborPlanner {
    fn kind(&self) -> PlannerKind {
        PlannerKind::Fallback
    }

    fn plan(&self, matrix: &DistanceMatrix) -> Option<Vec<StopId>> {
        Some(Self::route(matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Location;

    fn line(distance: fn((f64, f64), (f64, f64)) -> f64) -> DistanceMatrix {
        let stops = vec![
            Location::new(1, 0.0, 4.0),
            Location::new(2, 0.0, 1.0),
            Location::new(3, 0.0, 3.0),
            Location::new(4, 0.0, 2.0),
        ];
        DistanceMatrix::build((0.0, 0.0), &stops, distance)
    }

    #[test]
    fn test_visits_nearest_first() {
        let matrix = line(|a, b| (a.1 - b.1).abs());
        let route = NearestNeighborPlanner.plan(&matrix).unwrap();
        assert_eq!(route, vec![StopId(2), StopId(4), StopId(3), StopId(1)]);
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let matrix = line(|_, _| 1.0);
        let route = NearestNeighborPlanner::route(&matrix);
        assert_eq!(route, vec![StopId(1), StopId(2), StopId(3), StopId(4)]);
    }

    #[test]
    fn test_empty_stop_set() {
        let matrix = DistanceMatrix::build((0.0, 0.0), &[], |_, _| 1.0);
        assert!(NearestNeighborPlanner::route(&matrix).is_empty());
    }

    #[test]
    fn test_non_finite_distances_still_cover_all_stops() {
        let matrix = line(|_, _| f64::INFINITY);
        let mut route = NearestNeighborPlanner::route(&matrix);
        route.sort();
        assert_eq!(route, vec![StopId(1), StopId(2), StopId(3), StopId(4)]);
    }
}
