//! Route construction as a Markov decision process.
//!
//! A state is the depot it started from, the current node and the set of stops
//! already visited. An
//! action picks the next unvisited stop and costs the distance of that hop.
//! Every state before the terminal one has at least one valid action, so an
//! episode always ends after exactly one step per stop.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::matrix::DistanceMatrix;
use crate::traits::{location_key, Node, StopId};

/// Reward shaping and tour accounting for an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentOptions {
    /// Bonus added to the reward of the step that completes the route.
    pub completion_bonus: f64,
    /// Charge the leg back to the depot on the final step.
    pub return_to_depot: bool,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            completion_bonus: 0.0,
            return_to_depot: false,
        }
    }
}

/// Depot, current node and visited stops.
///
/// The depot is kept as rounded coordinates so that the same stops served from
/// different depots never share learned values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct State {
    depot: (i64, i64),
    current: Node,
    visited: BTreeSet<StopId>,
}

impl State {
    /// At `depot` with nothing visited.
    pub fn initial(depot: (f64, f64)) -> Self {
        Self {
            depot: location_key(depot),
            current: Node::Depot,
            visited: BTreeSet::new(),
        }
    }

    /// Rounded depot coordinates this state belongs to.
    pub fn depot_key(&self) -> (i64, i64) {
        self.depot
    }

    pub fn current(&self) -> Node {
        self.current
    }

    pub fn visited(&self) -> &BTreeSet<StopId> {
        &self.visited
    }

    pub fn has_visited(&self, id: StopId) -> bool {
        self.visited.contains(&id)
    }

    fn advance(&self, action: StopId) -> Self {
        let mut visited = self.visited.clone();
        visited.insert(action);
        Self {
            depot: self.depot,
            current: Node::Stop(action),
            visited,
        }
    }
}

/// Outcome of one environment step.
#[derive(Debug, Clone)]
pub struct Transition {
    pub next_state: State,
    pub reward: f64,
    /// Distance travelled in this step, including the return leg if charged.
    pub distance: f64,
    pub done: bool,
}

/// One route-construction episode over a fixed stop set.
#[derive(Debug, Clone)]
pub struct RouteEnvironment<'a> {
    matrix: &'a DistanceMatrix,
    options: EnvironmentOptions,
    stops: Vec<StopId>,
    state: State,
    route: Vec<StopId>,
    distance: f64,
}

impl<'a> RouteEnvironment<'a> {
    pub fn new(matrix: &'a DistanceMatrix, options: EnvironmentOptions) -> Self {
        let mut stops = matrix.stop_ids();
        stops.sort();
        Self {
            matrix,
            options,
            stops,
            state: State::initial(matrix.depot()),
            route: Vec::new(),
            distance: 0.0,
        }
    }

    /// Back to the depot with an empty route.
    pub fn reset(&mut self) -> State {
        self.state = State::initial(self.matrix.depot());
        self.route.clear();
        self.distance = 0.0;
        self.state.clone()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn matrix(&self) -> &DistanceMatrix {
        self.matrix
    }

    /// Stops not yet visited from `state`, in ascending id order.
    pub fn valid_actions(&self, state: &State) -> Vec<StopId> {
        self.stops
            .iter()
            .copied()
            .filter(|id| !state.has_visited(*id))
            .collect()
    }

    pub fn is_terminal(&self, state: &State) -> bool {
        self.stops.iter().all(|id| state.has_visited(*id))
    }

    /// Move to `action`; rejects stops outside the set or already visited.
    pub fn step(&mut self, action: StopId) -> Result<Transition> {
        if !self.matrix.contains(action) || self.state.has_visited(action) {
            return Err(PlannerError::InvalidAction(action));
        }

        let mut distance = self
            .matrix
            .between(self.state.current(), Node::Stop(action));
        let next_state = self.state.advance(action);
        let done = self.is_terminal(&next_state);

        if done && self.options.return_to_depot {
            distance += self.matrix.between(Node::Stop(action), Node::Depot);
        }

        let mut reward = -distance;
        if done {
            reward += self.options.completion_bonus;
        }

        self.state = next_state.clone();
        self.route.push(action);
        self.distance += distance;

        Ok(Transition {
            next_state,
            reward,
            distance,
            done,
        })
    }

    /// Stops visited so far, in order.
    pub fn route(&self) -> &[StopId] {
        &self.route
    }

    /// Distance travelled so far.
    pub fn distance(&self) -> f64 {
        self.distance
    }
}
