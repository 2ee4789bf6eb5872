//! Multi-vehicle route optimizer.
//!
//! Stops are split across vehicles with an angular sweep around the depot,
//! each group is ordered by the learned policy when it can, by the
//! nearest-neighbor planner otherwise, and the per-vehicle routes are summed
//! and compared against an unoptimized baseline.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::{LearnedPlanner, QTable, DEFAULT_MAX_LEARNED_STOPS};
use crate::environment::EnvironmentOptions;
use crate::error::{PlannerError, Result};
use crate::greedy::NearestNeighborPlanner;
use crate::haversine::HaversineMatrix;
use crate::matrix::DistanceMatrix;
use crate::partition;
use crate::policy::PolicyStore;
use crate::traits::{DistanceMatrixProvider, Location, PlannerKind, RoutePlanner, StopId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Average driving speed used for time estimates.
    pub average_speed_kmh: f64,
    /// Groups larger than this always go to the fallback planner.
    pub max_learned_stops: usize,
    /// Include the leg back to the depot in every route.
    pub return_to_depot: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            average_speed_kmh: 30.0,
            max_learned_stops: DEFAULT_MAX_LEARNED_STOPS,
            return_to_depot: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    /// Start of every route. Defaults to the first stop's coordinates.
    pub depot: Option<(f64, f64)>,
    pub stops: Vec<Location>,
    pub vehicles: usize,
}

impl OptimizationRequest {
    pub fn new(stops: Vec<Location>, vehicles: usize) -> Self {
        Self {
            depot: None,
            stops,
            vehicles,
        }
    }

    pub fn with_depot(mut self, lat: f64, lng: f64) -> Self {
        self.depot = Some((lat, lng));
        self
    }

    /// Reject empty, duplicated or out-of-range input before any work is done.
    pub fn validate(&self) -> Result<()> {
        if self.stops.is_empty() {
            return Err(PlannerError::EmptyRequest);
        }
        if self.vehicles < 1 {
            return Err(PlannerError::InvalidVehicleCount(self.vehicles));
        }

        let mut seen = HashSet::with_capacity(self.stops.len());
        for stop in &self.stops {
            if !seen.insert(stop.id()) {
                return Err(PlannerError::DuplicateStop(stop.id()));
            }
            if !stop.has_valid_coords() {
                let (lat, lng) = stop.coords();
                return Err(PlannerError::InvalidCoordinates {
                    id: stop.id(),
                    lat,
                    lng,
                });
            }
        }

        if let Some((lat, lng)) = self.depot {
            if !Location::new(0, lat, lng).has_valid_coords() {
                return Err(PlannerError::InvalidCoordinates {
                    id: StopId(0),
                    lat,
                    lng,
                });
            }
        }

        Ok(())
    }

    fn depot_coords(&self) -> (f64, f64) {
        self.depot
            .or_else(|| self.stops.first().map(Location::coords))
            .unwrap_or((0.0, 0.0))
    }
}

/// Route of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAssignment {
    /// 1-based vehicle number.
    pub vehicle: usize,
    pub stop_ids: Vec<StopId>,
    /// Distance of each leg, starting with depot to first stop.
    pub legs_km: Vec<f64>,
    pub distance_km: f64,
    pub estimated_minutes: f64,
    pub planner: PlannerKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub depot: (f64, f64),
    pub routes: Vec<RouteAssignment>,
    pub total_distance_km: f64,
    pub total_minutes: f64,
    /// Input order split sequentially across vehicles, no reordering.
    pub baseline_distance_km: f64,
    /// Reduction against the baseline; negative when the plan is longer.
    pub savings_pct: f64,
}

impl OptimizationResult {
    /// Number of stops across all vehicles.
    pub fn stop_count(&self) -> usize {
        self.routes.iter().map(|route| route.stop_ids.len()).sum()
    }

    /// Vehicles whose route came from the given planner.
    pub fn routes_by(&self, kind: PlannerKind) -> impl Iterator<Item = &RouteAssignment> {
        self.routes.iter().filter(move |route| route.planner == kind)
    }
}

/// Optimize `request` against a table snapshot.
pub fn solve<M>(
    request: &OptimizationRequest,
    table: &QTable,
    matrix_provider: &M,
    options: &SolveOptions,
) -> Result<OptimizationResult>
where
    M: DistanceMatrixProvider + Sync,
{
    request.validate()?;

    let depot = request.depot_coords();
    info!(
        stops = request.stops.len(),
        vehicles = request.vehicles,
        depot_lat = depot.0,
        depot_lng = depot.1,
        "optimizing routes"
    );

    let learned = LearnedPlanner::new(
        table,
        options.max_learned_stops,
        EnvironmentOptions {
            return_to_depot: options.return_to_depot,
            ..EnvironmentOptions::default()
        },
    );
    let planners: [&dyn RoutePlanner; 2] = [&learned, &NearestNeighborPlanner];

    let groups = partition::sweep(depot, &request.stops, request.vehicles);
    let routes: Vec<RouteAssignment> = groups
        .par_iter()
        .enumerate()
        .map(|(i, group)| {
            let matrix = matrix_provider.matrix_for(depot, group);
            route_group(i + 1, &matrix, &planners, options)
        })
        .collect();

    let baseline_distance_km: f64 = partition::sequential(&request.stops, request.vehicles)
        .iter()
        .map(|group| {
            let order: Vec<StopId> = group.iter().map(Location::id).collect();
            matrix_provider
                .matrix_for(depot, group)
                .route_length(&order, options.return_to_depot)
        })
        .sum();

    let total_distance_km: f64 = routes.iter().map(|route| route.distance_km).sum();
    let total_minutes: f64 = routes.iter().map(|route| route.estimated_minutes).sum();
    let savings_pct = improvement_pct(baseline_distance_km, total_distance_km);

    info!(
        vehicles = routes.len(),
        total_distance_km,
        baseline_distance_km,
        savings_pct,
        "routes optimized"
    );

    Ok(OptimizationResult {
        depot,
        routes,
        total_distance_km,
        total_minutes,
        baseline_distance_km,
        savings_pct,
    })
}

/// Relative reduction of `optimized` against `baseline`, in percent.
pub fn improvement_pct(baseline: f64, optimized: f64) -> f64 {
    if baseline > 0.0 {
        (baseline - optimized) / baseline * 100.0
    } else {
        0.0
    }
}

fn route_group(
    vehicle: usize,
    matrix: &DistanceMatrix,
    planners: &[&dyn RoutePlanner],
    options: &SolveOptions,
) -> RouteAssignment {
    // idle vehicles have nothing to learn from
    let (planner, stop_ids) = if matrix.stop_count() == 0 {
        (PlannerKind::Fallback, Vec::new())
    } else {
        planners
            .iter()
            .find_map(|planner| {
                planner
                    .plan(matrix)
                    .filter(|order| is_complete(order, matrix))
                    .map(|order| (planner.kind(), order))
            })
            .unwrap_or_else(|| (PlannerKind::Fallback, NearestNeighborPlanner::route(matrix)))
    };

    let legs_km = matrix.legs(&stop_ids, options.return_to_depot);
    let distance_km: f64 = legs_km.iter().sum();
    let estimated_minutes = if options.average_speed_kmh > 0.0 {
        distance_km / options.average_speed_kmh * 60.0
    } else {
        0.0
    };

    debug!(
        vehicle,
        stops = stop_ids.len(),
        distance_km,
        planner = %planner,
        "vehicle routed"
    );

    RouteAssignment {
        vehicle,
        stop_ids,
        legs_km,
        distance_km,
        estimated_minutes,
        planner,
    }
}

/// Every stop of the matrix exactly once.
fn is_complete(order: &[StopId], matrix: &DistanceMatrix) -> bool {
    let unique: HashSet<StopId> = order.iter().copied().collect();
    order.len() == matrix.stop_count()
        && unique.len() == order.len()
        && order.iter().all(|id| matrix.contains(*id))
}

/// Optimizer serving whatever table is currently published.
#[derive(Debug, Clone)]
pub struct RouteOptimizer<M = HaversineMatrix> {
    matrix_provider: M,
    options: SolveOptions,
    policy: PolicyStore,
}

impl Default for RouteOptimizer<HaversineMatrix> {
    fn default() -> Self {
        Self::new(HaversineMatrix, SolveOptions::default(), PolicyStore::default())
    }
}

impl<M> RouteOptimizer<M>
where
    M: DistanceMatrixProvider + Sync,
{
    pub fn new(matrix_provider: M, options: SolveOptions, policy: PolicyStore) -> Self {
        Self {
            matrix_provider,
            options,
            policy,
        }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    /// Handle used to publish freshly trained tables.
    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    pub fn optimize(&self, request: &OptimizationRequest) -> Result<OptimizationResult> {
        let table = self.policy.snapshot();
        solve(request, &table, &self.matrix_provider, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_malformed_requests() {
        let empty = OptimizationRequest::new(Vec::new(), 1);
        assert!(matches!(empty.validate(), Err(PlannerError::EmptyRequest)));

        let no_vehicles = OptimizationRequest::new(vec![Location::new(1, 0.0, 0.0)], 0);
        assert!(matches!(no_vehicles.validate(), Err(PlannerError::InvalidVehicleCount(0))));

        let duplicate = OptimizationRequest::new(
            vec![Location::new(1, 0.0, 0.0), Location::new(1, 1.0, 1.0)],
            1,
        );
        assert!(matches!(duplicate.validate(), Err(PlannerError::DuplicateStop(StopId(1)))));

        let bad_coords = OptimizationRequest::new(vec![Location::new(2, f64::NAN, 0.0)], 1);
        assert!(matches!(
            bad_coords.validate(),
            Err(PlannerError::InvalidCoordinates { id: StopId(2), .. })
        ));

        let bad_depot = OptimizationRequest::new(vec![Location::new(2, 0.0, 0.0)], 1)
            .with_depot(95.0, 0.0);
        assert!(bad_depot.validate().is_err());
    }

    #[test]
    fn test_depot_defaults_to_first_stop() {
        let request = OptimizationRequest::new(
            vec![Location::new(4, -12.0, -77.0), Location::new(5, -12.1, -77.1)],
            1,
        );
        assert_eq!(request.depot_coords(), (-12.0, -77.0));
        assert_eq!(request.with_depot(1.0, 2.0).depot_coords(), (1.0, 2.0));
    }

    #[test]
    fn test_improvement_pct() {
        assert_eq!(improvement_pct(100.0, 80.0), 20.0);
        assert_eq!(improvement_pct(100.0, 120.0), -20.0);
        assert_eq!(improvement_pct(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_is_complete_detects_missing_and_repeated_stops() {
        let stops = vec![Location::new(1, 0.0, 1.0), Location::new(2, 0.0, 2.0)];
        let matrix = DistanceMatrix::build((0.0, 0.0), &stops, |a, b| (a.1 - b.1).abs());
        assert!(is_complete(&[StopId(2), StopId(1)], &matrix));
        assert!(!is_complete(&[StopId(1)], &matrix));
        assert!(!is_complete(&[StopId(1), StopId(1)], &matrix));
        assert!(!is_complete(&[StopId(1), StopId(3)], &matrix));
    }

    #[test]
    fn test_time_follows_average_speed() {
        let stops = vec![Location::new(1, 0.0, 15.0)];
        let matrix = DistanceMatrix::build((0.0, 0.0), &stops, |a, b| (a.1 - b.1).abs());
        let planners: [&dyn RoutePlanner; 1] = [&NearestNeighborPlanner];
        let route = route_group(1, &matrix, &planners, &SolveOptions::default());
        // 15 km at 30 km/h
        assert_eq!(route.distance_km, 15.0);
        assert_eq!(route.estimated_minutes, 30.0);
        assert_eq!(route.planner, PlannerKind::Fallback);
    }

    struct AlwaysLearned;

    impl RoutePlanner for AlwaysLearned {
        fn kind(&self) -> PlannerKind {
            PlannerKind::Learned
        }

        fn plan(&self, matrix: &DistanceMatrix) -> Option<Vec<StopId>> {
            Some(matrix.stop_ids())
        }
    }

    #[test]
    fn test_idle_vehicle_skips_planners() {
        let matrix = DistanceMatrix::build((0.0, 0.0), &[], |a, b| (a.1 - b.1).abs());
        let planners: [&dyn RoutePlanner; 1] = [&AlwaysLearned];
        let route = route_group(3, &matrix, &planners, &SolveOptions::default());
        assert!(route.stop_ids.is_empty());
        assert_eq!(route.distance_km, 0.0);
        assert_eq!(route.planner, PlannerKind::Fallback);

        let stops = vec![Location::new(1, 0.0, 2.0)];
        let busy = DistanceMatrix::build((0.0, 0.0), &stops, |a, b| (a.1 - b.1).abs());
        assert_eq!(route_group(1, &busy, &planners, &SolveOptions::default()).planner, PlannerKind::Learned);
    }
}
