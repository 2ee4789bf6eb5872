//! Tabular Q-learning agent for stop sequencing.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::environment::{EnvironmentOptions, RouteEnvironment, State};
use crate::error::{PlannerError, Result};
use crate::matrix::DistanceMatrix;
use crate::traits::{location_key, Location, PlannerKind, RoutePlanner, StopId};

/// Value assumed for (state, action) pairs the table has never seen.
pub const INITIAL_Q_VALUE: f64 = 0.0;

/// Default ceiling on the stop count of a learned route.
pub const DEFAULT_MAX_LEARNED_STOPS: usize = 8;

/// Hyper-parameters of the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Step size of the temporal-difference update.
    pub learning_rate: f64,
    /// Weight of the continuation value.
    pub discount_factor: f64,
    pub exploration: ExplorationSchedule,
    /// Largest stop set the table is trained on or trusted for.
    ///
    /// A set of n stops has (n + 1) * 2^n states; with the default 1000
    /// episodes, 8 stops is the largest set whose greedy path is reliably
    /// learned. Raise it together with the episode budget.
    pub max_learned_stops: usize,
    /// Seed for exploration; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration: ExplorationSchedule::default(),
            max_learned_stops: DEFAULT_MAX_LEARNED_STOPS,
            seed: None,
        }
    }
}

/// Exponential decay of the exploration rate toward a floor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationSchedule {
    pub start: f64,
    pub floor: f64,
    pub decay: f64,
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self {
            start: 1.0,
            floor: 0.01,
            decay: 0.995,
        }
    }
}

impl ExplorationSchedule {
    /// Exploration rate for the given zero-based episode.
    pub fn rate(&self, episode: usize) -> f64 {
        let exponent = i32::try_from(episode).unwrap_or(i32::MAX);
        (self.start * self.decay.powi(exponent)).max(self.floor).clamp(0.0, 1.0)
    }
}

/// Learned values keyed by state, then by action.
///
/// Also remembers, per depot, every stop it was trained on, so inference can
/// refuse stop sets it has never seen from that depot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "QTableSnapshot", from = "QTableSnapshot")]
pub struct QTable {
    values: HashMap<State, BTreeMap<StopId, f64>>,
    known: BTreeMap<(i64, i64), BTreeMap<StopId, (i64, i64)>>,
    episodes_trained: u64,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, or `None` if the pair was never updated.
    pub fn get(&self, state: &State, action: StopId) -> Option<f64> {
        self.values.get(state).and_then(|row| row.get(&action)).copied()
    }

    /// Stored value, falling back to [`INITIAL_Q_VALUE`].
    pub fn value(&self, state: &State, action: StopId) -> f64 {
        self.get(state, action).unwrap_or(INITIAL_Q_VALUE)
    }

    /// Write a value. Actions that would revisit a stop are rejected.
    pub fn set(&mut self, state: &State, action: StopId, value: f64) -> Result<()> {
        if state.has_visited(action) {
            return Err(PlannerError::InvalidAction(action));
        }
        self.values
            .entry(state.clone())
            .or_default()
            .insert(action, value);
        Ok(())
    }

    /// Number of (state, action) entries.
    pub fn len(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn state_count(&self) -> usize {
        self.values.len()
    }

    pub fn episodes_trained(&self) -> u64 {
        self.episodes_trained
    }

    pub(crate) fn record_episodes(&mut self, episodes: u64) {
        self.episodes_trained += episodes;
    }

    /// Remember the depot and stops of a stop set the table is trained on.
    pub fn register_locations(&mut self, depot: (f64, f64), stops: &[Location]) {
        let known = self.known.entry(location_key(depot)).or_default();
        for stop in stops {
            known.insert(stop.id(), location_key(stop.coords()));
        }
    }

    /// Whether every stop of `matrix` was trained from the matrix's depot at
    /// the same coordinates. An empty stop set is never covered.
    pub fn covers(&self, matrix: &DistanceMatrix) -> bool {
        let Some(known) = self.known.get(&location_key(matrix.depot())) else {
            return false;
        };
        matrix.stop_count() > 0
            && matrix
                .stops()
                .iter()
                .all(|stop| known.get(&stop.id()) == Some(&location_key(stop.coords())))
    }

    /// Serialize to a JSON snapshot.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a table from a JSON snapshot produced by [`QTable::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Serialized form of a [`QTable`]; JSON maps cannot use composite keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QTableSnapshot {
    episodes_trained: u64,
    locations: Vec<KnownStop>,
    entries: Vec<QEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KnownStop {
    depot: (i64, i64),
    id: StopId,
    at: (i64, i64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QEntry {
    state: State,
    action: StopId,
    value: f64,
}

impl From<QTable> for QTableSnapshot {
    fn from(table: QTable) -> Self {
        let mut entries: Vec<QEntry> = table
            .values
            .into_iter()
            .flat_map(|(state, row)| {
                row.into_iter().map(move |(action, value)| QEntry {
                    state: state.clone(),
                    action,
                    value,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.state.cmp(&b.state).then(a.action.cmp(&b.action)));

        let locations = table
            .known
            .into_iter()
            .flat_map(|(depot, stops)| {
                stops
                    .into_iter()
                    .map(move |(id, at)| KnownStop { depot, id, at })
            })
            .collect();

        Self {
            episodes_trained: table.episodes_trained,
            locations,
            entries,
        }
    }
}

impl From<QTableSnapshot> for QTable {
    fn from(snapshot: QTableSnapshot) -> Self {
        let mut table = QTable {
            values: HashMap::new(),
            known: BTreeMap::new(),
            episodes_trained: snapshot.episodes_trained,
        };
        for stop in snapshot.locations {
            table
                .known
                .entry(stop.depot)
                .or_default()
                .insert(stop.id, stop.at);
        }
        for entry in snapshot.entries {
            if let Err(err) = table.set(&entry.state, entry.action, entry.value) {
                warn!("dropping snapshot entry: {}", err);
            }
        }
        table
    }
}

/// Q-learning agent owning its table for the duration of a training run.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    table: QTable,
    config: AgentConfig,
    rng: SmallRng,
}

impl QLearningAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self::with_table(QTable::new(), config)
    }

    /// Continue training from an existing table.
    pub fn with_table(table: QTable, config: AgentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { table, config, rng }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut QTable {
        &mut self.table
    }

    pub(crate) fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Give up the agent and keep only its learned table.
    pub fn into_table(self) -> QTable {
        self.table
    }

    /// Epsilon-greedy choice among `actions`.
    ///
    /// `actions` must be the valid actions of `state`. Returns `None` only when
    /// there is nothing left to visit.
    pub fn select_action(
        &mut self,
        state: &State,
        actions: &[StopId],
        exploration_rate: f64,
    ) -> Option<StopId> {
        if actions.is_empty() {
            return None;
        }
        let exploration_rate = if exploration_rate.is_nan() {
            0.0
        } else {
            exploration_rate.clamp(0.0, 1.0)
        };
        if self.rng.gen_bool(exploration_rate) {
            return actions.choose(&mut self.rng).copied();
        }
        best_action(&self.table, state, actions)
    }

    /// Temporal-difference update of `Q(state, action)`.
    ///
    /// `next_actions` are the valid actions of `next_state`; an empty slice
    /// marks a terminal transition with no continuation value. Returns the TD
    /// error.
    pub fn update(
        &mut self,
        state: &State,
        action: StopId,
        reward: f64,
        next_state: &State,
        next_actions: &[StopId],
    ) -> Result<f64> {
        let continuation = if next_actions.is_empty() {
            0.0
        } else {
            max_value(&self.table, next_state, next_actions)
        };

        let current = self.table.value(state, action);
        let target = reward + self.config.discount_factor * continuation;
        let td_error = target - current;
        self.table
            .set(state, action, current + self.config.learning_rate * td_error)?;
        Ok(td_error)
    }
}

/// Highest-valued action, lowest id on ties. Unseen pairs count as
/// [`INITIAL_Q_VALUE`].
pub fn best_action(table: &QTable, state: &State, actions: &[StopId]) -> Option<StopId> {
    let mut best: Option<(StopId, f64)> = None;
    for &action in actions {
        let value = table.value(state, action);
        match best {
            Some((best_id, best_value))
                if value < best_value || (value == best_value && action > best_id) => {}
            _ => best = Some((action, value)),
        }
    }
    best.map(|(action, _)| action)
}

/// Highest learned action, lowest id on ties. Pairs the table has never seen
/// are skipped; `None` when none of `actions` has a learned value.
pub fn best_learned_action(table: &QTable, state: &State, actions: &[StopId]) -> Option<StopId> {
    let row = table.values.get(state)?;
    let mut best: Option<(StopId, f64)> = None;
    for &action in actions {
        let Some(&value) = row.get(&action) else {
            continue;
        };
        match best {
            Some((best_id, best_value))
                if value < best_value || (value == best_value && action > best_id) => {}
            _ => best = Some((action, value)),
        }
    }
    best.map(|(action, _)| action)
}

fn max_value(table: &QTable, state: &State, actions: &[StopId]) -> f64 {
    actions
        .iter()
        .map(|action| table.value(state, *action))
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Greedy (ε = 0) rollout of a learned table.
///
/// Only learned (state, action) pairs are followed, so every step stays on
/// ground the agent actually explored. Declines stop sets larger than the
/// tractable ceiling, stop sets the table was not trained on from this depot,
/// and any state where none of the remaining actions has a learned value.
#[derive(Debug, Clone)]
pub struct LearnedPlanner<'a> {
    table: &'a QTable,
    max_stops: usize,
    options: EnvironmentOptions,
}

impl<'a> LearnedPlanner<'a> {
    pub fn new(table: &'a QTable, max_stops: usize, options: EnvironmentOptions) -> Self {
        Self {
            table,
            max_stops,
            options,
        }
    }
}

impl RoutePlanner for LearnedPlanner<'_> {
    fn kind(&self) -> PlannerKind {
        PlannerKind::Learned
    }

    fn plan(&self, matrix: &DistanceMatrix) -> Option<Vec<StopId>> {
        if matrix.stop_count() > self.max_stops || !self.table.covers(matrix) {
            return None;
        }

        let mut env = RouteEnvironment::new(matrix, self.options.clone());
        let mut state = env.reset();
        while !env.is_terminal(&state) {
            let actions = env.valid_actions(&state);
            let action = best_learned_action(self.table, &state, &actions)?;
            state = env.step(action).ok()?.next_state;
        }

        Some(env.route().to_vec())
    }
}
