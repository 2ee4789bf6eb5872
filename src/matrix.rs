//! Dense distance matrix over a depot and its stops.

use std::collections::HashMap;

use crate::traits::{Location, Node, StopId};

/// Square, symmetric matrix of distances in kilometers.
///
/// Index 0 is always the depot; stops follow in the order they were supplied.
/// Built per request and never persisted.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    depot: (f64, f64),
    stops: Vec<Location>,
    index: HashMap<StopId, usize>,
    data: Vec<f64>,
    size: usize,
}

impl DistanceMatrix {
    /// Builds a matrix calling `distance` once per unordered pair.
    pub fn build<F>(depot: (f64, f64), stops: &[Location], distance: F) -> Self
    where
        F: Fn((f64, f64), (f64, f64)) -> f64,
    {
        let size = stops.len() + 1;
        let coords: Vec<(f64, f64)> = std::iter::once(depot)
            .chain(stops.iter().map(Location::coords))
            .collect();

        let mut data = vec![0.0; size * size];
        for i in 0..size {
            for j in (i + 1)..size {
                let d = distance(coords[i], coords[j]).max(0.0);
                data[i * size + j] = d;
                data[j * size + i] = d;
            }
        }

        let index = stops
            .iter()
            .enumerate()
            .map(|(i, stop)| (stop.id(), i + 1))
            .collect();

        Self {
            depot,
            stops: stops.to_vec(),
            index,
            data,
            size,
        }
    }

    pub fn depot(&self) -> (f64, f64) {
        self.depot
    }

    /// Stops in the order they were supplied.
    pub fn stops(&self) -> &[Location] {
        &self.stops
    }

    pub fn stop_ids(&self) -> Vec<StopId> {
        self.stops.iter().map(Location::id).collect()
    }

    /// Number of stops, excluding the depot.
    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn contains(&self, id: StopId) -> bool {
        self.index.contains_key(&id)
    }

    /// Distance between two nodes. Unknown stops are treated as the depot.
    pub fn between(&self, from: Node, to: Node) -> f64 {
        self.data[self.slot(from) * self.size + self.slot(to)]
    }

    /// Per-leg distances of `order`, starting at the depot.
    ///
    /// When `return_to_depot` is set the final leg back to the depot is included.
    pub fn legs(&self, order: &[StopId], return_to_depot: bool) -> Vec<f64> {
        let mut legs = Vec::with_capacity(order.len() + 1);
        let mut current = Node::Depot;
        for &id in order {
            let next = Node::Stop(id);
            legs.push(self.between(current, next));
            current = next;
        }
        if return_to_depot && !order.is_empty() {
            legs.push(self.between(current, Node::Depot));
        }
        legs
    }

    /// Total length of `order` starting at the depot.
    pub fn route_length(&self, order: &[StopId], return_to_depot: bool) -> f64 {
        self.legs(order, return_to_depot).iter().sum()
    }

    fn slot(&self, node: Node) -> usize {
        match node {
            Node::Depot => 0,
            Node::Stop(id) => self.index.get(&id).copied().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manhattan(a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - b.0).abs() + (a.1 - b.1).abs()
    }

    fn stops() -> Vec<Location> {
        vec![
            Location::new(10, 1.0, 0.0),
            Location::new(20, 2.0, 0.0),
            Location::new(30, 2.0, 3.0),
        ]
    }

    #[test]
    fn test_diagonal_is_zero_and_symmetric() {
        let matrix = DistanceMatrix::build((0.0, 0.0), &stops(), manhattan);
        let nodes = [
            Node::Depot,
            Node::Stop(StopId(10)),
            Node::Stop(StopId(20)),
            Node::Stop(StopId(30)),
        ];
        for a in nodes {
            assert_eq!(matrix.between(a, a), 0.0);
            for b in nodes {
                assert_eq!(matrix.between(a, b), matrix.between(b, a));
            }
        }
    }

    #[test]
    fn test_each_pair_computed_once() {
        let calls = std::cell::Cell::new(0);
        let _ = DistanceMatrix::build((0.0, 0.0), &stops(), |a, b| {
            calls.set(calls.get() + 1);
            manhattan(a, b)
        });
        // 4 nodes -> 6 unordered pairs
        assert_eq!(calls.get(), 6);
    }

    #[test]
    fn test_route_length_and_legs() {
        let matrix = DistanceMatrix::build((0.0, 0.0), &stops(), manhattan);
        let order = [StopId(10), StopId(20), StopId(30)];
        assert_eq!(matrix.legs(&order, false), vec![1.0, 1.0, 3.0]);
        assert_eq!(matrix.route_length(&order, false), 5.0);
        assert_eq!(matrix.route_length(&order, true), 10.0);
        assert_eq!(matrix.route_length(&[], true), 0.0);
    }

    #[test]
    fn test_negative_distances_are_clamped() {
        let matrix = DistanceMatrix::build((0.0, 0.0), &stops(), |_, _| -1.0);
        assert_eq!(matrix.between(Node::Depot, Node::Stop(StopId(10))), 0.0);
    }
}
