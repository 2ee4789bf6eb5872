//! Splitting stops across vehicles.
//!
//! Both splits keep every stop exactly once and never produce more groups
//! than vehicles. With n stops and k vehicles, [`sweep`] gives each group
//! ⌊n/k⌋ or ⌈n/k⌉ stops, so a group is only empty when n < k.

use crate::traits::Location;

/// Sizes of `vehicles` balanced groups over `stops` stops.
pub fn balanced_sizes(stops: usize, vehicles: usize) -> Vec<usize> {
    if vehicles == 0 {
        return Vec::new();
    }
    let base = stops / vehicles;
    let extra = stops % vehicles;
    (0..vehicles)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// Angular sweep around the depot.
///
/// Stops are ordered by polar angle from the depot (ties by distance from the
/// depot, then id) and cut into consecutive balanced groups, so each vehicle
/// covers one sector.
pub fn sweep(depot: (f64, f64), stops: &[Location], vehicles: usize) -> Vec<Vec<Location>> {
    let mut ordered: Vec<(f64, f64, Location)> = stops
        .iter()
        .map(|stop| {
            let (lat, lng) = stop.coords();
            let dy = lat - depot.0;
            let dx = lng - depot.1;
            (dy.atan2(dx), dx * dx + dy * dy, *stop)
        })
        .collect();

    ordered.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then_with(|| a.2.id().cmp(&b.2.id()))
    });

    let mut ordered = ordered.into_iter().map(|(_, _, stop)| stop);
    balanced_sizes(stops.len(), vehicles)
        .into_iter()
        .map(|size| ordered.by_ref().take(size).collect())
        .collect()
}

/// Input order cut into chunks of ⌈n/k⌉; trailing vehicles may get nothing.
///
/// Used as the unoptimized baseline.
pub fn sequential(stops: &[Location], vehicles: usize) -> Vec<Vec<Location>> {
    if vehicles == 0 {
        return Vec::new();
    }
    let chunk = stops.len().div_ceil(vehicles).max(1);
    let mut groups: Vec<Vec<Location>> = stops.chunks(chunk).map(<[Location]>::to_vec).collect();
    groups.resize_with(vehicles, Vec::new);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: u64) -> Vec<Location> {
        (0..n)
            .map(|i| {
                let angle = i as f64 / n as f64 * std::f64::consts::TAU;
                Location::new(i + 1, angle.sin(), angle.cos())
            })
            .collect()
    }

    fn ids(groups: &[Vec<Location>]) -> Vec<u64> {
        let mut ids: Vec<u64> = groups.iter().flatten().map(|s| s.id().0).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_balanced_sizes() {
        assert_eq!(balanced_sizes(6, 2), vec![3, 3]);
        assert_eq!(balanced_sizes(7, 3), vec![3, 2, 2]);
        assert_eq!(balanced_sizes(6, 7), vec![1, 1, 1, 1, 1, 1, 0]);
        assert!(balanced_sizes(3, 0).is_empty());
    }

    #[test]
    fn test_sweep_keeps_every_stop_once() {
        let stops = ring(11);
        let groups = sweep((0.0, 0.0), &stops, 4);
        assert_eq!(groups.len(), 4);
        assert_eq!(ids(&groups), (1..=11).collect::<Vec<_>>());
        let largest = groups.iter().map(Vec::len).max().unwrap();
        let smallest = groups.iter().map(Vec::len).min().unwrap();
        assert!(largest - smallest <= 1);
    }

    #[test]
    fn test_sweep_groups_neighbouring_sectors() {
        // Two clusters on opposite sides of the depot
        let stops = vec![
            Location::new(1, 1.0, 1.0),
            Location::new(2, -1.0, -1.0),
            Location::new(3, 1.1, 1.0),
            Location::new(4, -1.1, -1.0),
        ];
        let groups = sweep((0.0, 0.0), &stops, 2);
        let mut first: Vec<u64> = groups[0].iter().map(|s| s.id().0).collect();
        let mut second: Vec<u64> = groups[1].iter().map(|s| s.id().0).collect();
        first.sort();
        second.sort();
        assert_eq!(first, vec![2, 4]);
        assert_eq!(second, vec![1, 3]);
    }

    #[test]
    fn test_sequential_keeps_input_order() {
        let stops = ring(5);
        let groups = sequential(&stops, 2);
        let first: Vec<u64> = groups[0].iter().map(|s| s.id().0).collect();
        let second: Vec<u64> = groups[1].iter().map(|s| s.id().0).collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(second, vec![4, 5]);
    }

    #[test]
    fn test_sequential_pads_with_empty_groups() {
        let groups = sequential(&ring(2), 4);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups.iter().filter(|g| g.is_empty()).count(), 2);
    }
}
