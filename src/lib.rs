//! route-rl-planner
//!
//! Delivery route optimization with a tabular Q-learning agent and a
//! nearest-neighbor fallback, split across a small fleet of vehicles.

pub mod agent;
pub mod environment;
pub mod error;
pub mod greedy;
pub mod haversine;
pub mod matrix;
pub mod partition;
pub mod policy;
pub mod solver;
pub mod traits;
pub mod training;

pub use agent::{AgentConfig, ExplorationSchedule, LearnedPlanner, QLearningAgent, QTable};
pub use environment::{EnvironmentOptions, RouteEnvironment, State};
pub use error::{PlannerError, Result};
pub use greedy::NearestNeighborPlanner;
pub use haversine::{haversine_km, HaversineMatrix};
pub use matrix::DistanceMatrix;
pub use policy::PolicyStore;
pub use solver::{
    solve, OptimizationRequest, OptimizationResult, RouteAssignment, RouteOptimizer, SolveOptions,
};
pub use traits::{DistanceMatrixProvider, Location, Node, PlannerKind, RoutePlanner, StopId};
pub use training::{
    HistoricalRoute, ReplayMode, SyntheticConfig, Trainer, TrainingConfig, TrainingMetrics,
    TrainingSource,
};
