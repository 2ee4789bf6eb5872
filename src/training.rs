//! Training loop for the route agent.
//!
//! Episodes cycle through the supplied stop sets. Each episode starts at the
//! depot, lets the agent pick stops until every stop is visited and updates the
//! table after each step. When too few usable historical records are supplied,
//! synthetic stop sets around a service-area centre are added and the run is
//! labelled as synthetic.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::{AgentConfig, LearnedPlanner, QLearningAgent, QTable};
use crate::environment::{EnvironmentOptions, RouteEnvironment};
use crate::error::Result;
use crate::haversine::HaversineMatrix;
use crate::matrix::DistanceMatrix;
use crate::solver::{improvement_pct, OptimizationRequest};
use crate::traits::{DistanceMatrixProvider, Location, RoutePlanner, StopId};

/// A past delivery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRoute {
    /// Route start. Defaults to the first stop's coordinates.
    pub depot: Option<(f64, f64)>,
    pub stops: Vec<Location>,
    /// Order the stops were actually driven in, if known.
    pub actual_order: Option<Vec<StopId>>,
}

impl HistoricalRoute {
    pub fn new(stops: Vec<Location>) -> Self {
        Self {
            depot: None,
            stops,
            actual_order: None,
        }
    }

    pub fn with_depot(mut self, lat: f64, lng: f64) -> Self {
        self.depot = Some((lat, lng));
        self
    }

    pub fn with_actual_order(mut self, order: Vec<u64>) -> Self {
        self.actual_order = Some(order.into_iter().map(StopId).collect());
        self
    }
}

/// How recorded visiting orders take part in training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Recorded orders are only scored for the metrics.
    #[default]
    EvaluationOnly,
    /// Recorded orders are also replayed as table-updating episodes.
    Guided,
}

/// Where the training stop sets came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingSource {
    Historical,
    Synthetic,
}

/// Bootstrap data used when historical records are insufficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub routes: usize,
    pub min_stops: usize,
    pub max_stops: usize,
    /// Service-area centre (lat, lng); also the depot of every synthetic route.
    pub center: (f64, f64),
    /// Half-width of the square around the centre, in degrees.
    pub spread_deg: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            routes: 10,
            min_stops: 4,
            max_stops: 8,
            center: (-12.046374, -77.042793),
            spread_deg: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Episode budget; the only limit on a training run.
    pub episodes: usize,
    /// Fewer usable records than this triggers synthetic bootstrap.
    pub min_historical_records: usize,
    /// Trailing window for the mean reward.
    pub reward_window: usize,
    pub replay: ReplayMode,
    /// With guided replay, every n-th episode replays a recorded order.
    pub replay_interval: usize,
    pub environment: EnvironmentOptions,
    pub synthetic: SyntheticConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 1000,
            min_historical_records: 1,
            reward_window: 100,
            replay: ReplayMode::EvaluationOnly,
            replay_interval: 10,
            environment: EnvironmentOptions::default(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Episodes run in this training call.
    pub episodes: usize,
    /// Episodes accumulated by the table across runs.
    pub episodes_trained: u64,
    pub mean_reward: f64,
    pub final_reward: f64,
    /// Sum over stop sets of the greedy policy's route length. Sets the policy
    /// declines count at their baseline length.
    pub policy_distance_km: f64,
    /// Stop sets the greedy policy could not route.
    pub policy_declined: usize,
    /// Sum over stop sets of the shortest route seen in any episode,
    /// exploring ones included.
    pub best_seen_km: f64,
    /// Sum over stop sets of the input-order route length.
    pub baseline_distance_km: f64,
    /// Policy against baseline; negative when the policy routes are longer.
    pub improvement_pct: f64,
    /// Sum of recorded route lengths, for records that carry one.
    pub historical_distance_km: Option<f64>,
    pub source: TrainingSource,
    pub records_used: usize,
    pub records_skipped: usize,
    pub table_entries: usize,
}

/// Result of one episode.
#[derive(Debug, Clone)]
pub struct EpisodeOutcome {
    pub reward: f64,
    pub distance: f64,
    pub route: Vec<StopId>,
}

struct PreparedRoute {
    matrix: DistanceMatrix,
    actual_order: Option<Vec<StopId>>,
    baseline: f64,
    best_seen: Option<f64>,
    policy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Trainer<M = HaversineMatrix> {
    config: TrainingConfig,
    matrix_provider: M,
}

impl Default for Trainer<HaversineMatrix> {
    fn default() -> Self {
        Self::new(TrainingConfig::default(), HaversineMatrix)
    }
}

impl<M> Trainer<M>
where
    M: DistanceMatrixProvider,
{
    pub fn new(config: TrainingConfig, matrix_provider: M) -> Self {
        Self {
            config,
            matrix_provider,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train a fresh agent and hand back its table with the run's metrics.
    pub fn run(
        &self,
        agent_config: AgentConfig,
        records: &[HistoricalRoute],
    ) -> Result<(QTable, TrainingMetrics)> {
        let mut agent = QLearningAgent::new(agent_config);
        let metrics = self.train(&mut agent, records)?;
        Ok((agent.into_table(), metrics))
    }

    /// Train `agent` in place over the configured episode budget.
    pub fn train(
        &self,
        agent: &mut QLearningAgent,
        records: &[HistoricalRoute],
    ) -> Result<TrainingMetrics> {
        let max_stops = agent.config().max_learned_stops;
        let (mut prepared, records_skipped) = self.prepare(records, max_stops);

        let mut source = TrainingSource::Historical;
        if prepared.len() < self.config.min_historical_records.max(1) {
            warn!(
                usable = prepared.len(),
                required = self.config.min_historical_records,
                "insufficient historical routes, bootstrapping with synthetic data"
            );
            let synthetic = synthetic_routes(&self.config.synthetic, agent.rng_mut());
            let (extra, _) = self.prepare(&synthetic, max_stops);
            prepared.extend(extra);
            source = TrainingSource::Synthetic;
        }

        info!(
            episodes = self.config.episodes,
            stop_sets = prepared.len(),
            ?source,
            "training route policy"
        );

        let mut rewards = Vec::with_capacity(self.config.episodes);
        if !prepared.is_empty() {
            let schedule = agent.config().exploration;
            let stop_sets = prepared.len();
            for episode in 0..self.config.episodes {
                let route = &mut prepared[episode % stop_sets];
                let guided = match (&route.actual_order, self.config.replay) {
                    (Some(order), ReplayMode::Guided)
                        if self.config.replay_interval > 0
                            && (episode + 1) % self.config.replay_interval == 0 =>
                    {
                        Some(order.clone())
                    }
                    _ => None,
                };

                let outcome = match guided {
                    Some(order) => {
                        replay_episode(agent, &route.matrix, &order, &self.config.environment)?
                    }
                    None => run_episode(
                        agent,
                        &route.matrix,
                        schedule.rate(episode),
                        &self.config.environment,
                    )?,
                };

                route.best_seen = Some(
                    route
                        .best_seen
                        .map_or(outcome.distance, |b| b.min(outcome.distance)),
                );
                rewards.push(outcome.reward);
            }
        }

        let table = agent.table_mut();
        for route in &prepared {
            table.register_locations(route.matrix.depot(), route.matrix.stops());
        }
        table.record_episodes(self.config.episodes as u64);

        let planner = LearnedPlanner::new(agent.table(), max_stops, self.config.environment.clone());
        for route in &mut prepared {
            route.policy = planner.plan(&route.matrix).map(|order| {
                route
                    .matrix
                    .route_length(&order, self.config.environment.return_to_depot)
            });
        }

        let metrics = self.summarize(&prepared, &rewards, records_skipped, source, agent.table());

        if metrics.policy_declined > 0 {
            warn!(
                declined = metrics.policy_declined,
                stop_sets = metrics.records_used,
                "learned policy cannot route every training stop set"
            );
        }
        if metrics.improvement_pct < 0.0 {
            warn!(
                improvement_pct = metrics.improvement_pct,
                "learned routes are longer than the baseline"
            );
        }
        info!(
            episodes = metrics.episodes,
            mean_reward = metrics.mean_reward,
            improvement_pct = metrics.improvement_pct,
            table_entries = metrics.table_entries,
            "training complete"
        );

        Ok(metrics)
    }

    fn prepare(&self, records: &[HistoricalRoute], max_stops: usize) -> (Vec<PreparedRoute>, usize) {
        let mut prepared = Vec::with_capacity(records.len());
        let mut skipped = 0;

        for (i, record) in records.iter().enumerate() {
            let request = OptimizationRequest {
                depot: record.depot,
                stops: record.stops.clone(),
                vehicles: 1,
            };
            if let Err(err) = request.validate() {
                warn!(record = i, "skipping historical route: {}", err);
                skipped += 1;
                continue;
            }
            if record.stops.len() > max_stops {
                warn!(
                    record = i,
                    stops = record.stops.len(),
                    max_stops,
                    "skipping historical route above the learned stop ceiling"
                );
                skipped += 1;
                continue;
            }

            let depot = record
                .depot
                .unwrap_or_else(|| record.stops[0].coords());
            let matrix = self.matrix_provider.matrix_for(depot, &record.stops);
            let baseline_order: Vec<StopId> = record.stops.iter().map(Location::id).collect();
            let baseline = matrix.route_length(&baseline_order, self.config.environment.return_to_depot);

            let actual_order = record.actual_order.clone().filter(|order| {
                let valid = is_permutation(order, &baseline_order);
                if !valid {
                    debug!(record = i, "ignoring recorded order that is not a permutation of the stops");
                }
                valid
            });

            prepared.push(PreparedRoute {
                matrix,
                actual_order,
                baseline,
                best_seen: None,
                policy: None,
            });
        }

        (prepared, skipped)
    }

    fn summarize(
        &self,
        prepared: &[PreparedRoute],
        rewards: &[f64],
        records_skipped: usize,
        source: TrainingSource,
        table: &QTable,
    ) -> TrainingMetrics {
        let return_to_depot = self.config.environment.return_to_depot;
        let baseline_distance_km: f64 = prepared.iter().map(|r| r.baseline).sum();
        let policy_distance_km: f64 = prepared
            .iter()
            .map(|r| r.policy.unwrap_or(r.baseline))
            .sum();
        let policy_declined = prepared.iter().filter(|r| r.policy.is_none()).count();
        let best_seen_km: f64 = prepared
            .iter()
            .map(|r| r.best_seen.unwrap_or(r.baseline))
            .sum();

        let recorded: Vec<f64> = prepared
            .iter()
            .filter_map(|r| {
                r.actual_order
                    .as_ref()
                    .map(|order| r.matrix.route_length(order, return_to_depot))
            })
            .collect();
        let historical_distance_km = (!recorded.is_empty()).then(|| recorded.iter().sum());

        let window = self.config.reward_window.max(1).min(rewards.len());
        let mean_reward = if window > 0 {
            rewards[rewards.len() - window..].iter().sum::<f64>() / window as f64
        } else {
            0.0
        };

        TrainingMetrics {
            episodes: rewards.len(),
            episodes_trained: table.episodes_trained(),
            mean_reward,
            final_reward: rewards.last().copied().unwrap_or(0.0),
            policy_distance_km,
            policy_declined,
            best_seen_km,
            baseline_distance_km,
            improvement_pct: improvement_pct(baseline_distance_km, policy_distance_km),
            historical_distance_km,
            source,
            records_used: prepared.len(),
            records_skipped,
            table_entries: table.len(),
        }
    }
}

/// Run one exploring episode, updating the table after every step.
pub fn run_episode(
    agent: &mut QLearningAgent,
    matrix: &DistanceMatrix,
    exploration_rate: f64,
    options: &EnvironmentOptions,
) -> Result<EpisodeOutcome> {
    let mut env = RouteEnvironment::new(matrix, options.clone());
    let mut state = env.reset();
    let mut reward = 0.0;

    while !env.is_terminal(&state) {
        let actions = env.valid_actions(&state);
        let Some(action) = agent.select_action(&state, &actions, exploration_rate) else {
            break;
        };
        let transition = env.step(action)?;
        let next_actions = env.valid_actions(&transition.next_state);
        agent.update(&state, action, transition.reward, &transition.next_state, &next_actions)?;
        reward += transition.reward;
        state = transition.next_state;
    }

    Ok(EpisodeOutcome {
        reward,
        distance: env.distance(),
        route: env.route().to_vec(),
    })
}

/// Replay a recorded order as a guided episode that updates the table.
pub fn replay_episode(
    agent: &mut QLearningAgent,
    matrix: &DistanceMatrix,
    order: &[StopId],
    options: &EnvironmentOptions,
) -> Result<EpisodeOutcome> {
    let mut env = RouteEnvironment::new(matrix, options.clone());
    let mut state = env.reset();
    let mut reward = 0.0;

    for &action in order {
        let transition = env.step(action)?;
        let next_actions = env.valid_actions(&transition.next_state);
        agent.update(&state, action, transition.reward, &transition.next_state, &next_actions)?;
        reward += transition.reward;
        state = transition.next_state;
    }

    Ok(EpisodeOutcome {
        reward,
        distance: env.distance(),
        route: env.route().to_vec(),
    })
}

/// Random stop sets around the configured centre.
///
/// Route `r` (zero-based) uses ids `(r + 1) * stride + 1 ..` where the stride
/// is 1000, or `max_stops + 1` when that is larger, so stops of different
/// synthetic routes never share an id.
pub fn synthetic_routes<R: Rng>(config: &SyntheticConfig, rng: &mut R) -> Vec<HistoricalRoute> {
    let min_stops = config.min_stops.max(1);
    let max_stops = config.max_stops.max(min_stops);
    let spread = config.spread_deg.abs();
    let (lat, lng) = config.center;
    let stride = (max_stops as u64 + 1).max(1000);

    (0..config.routes)
        .map(|r| {
            let count = rng.gen_range(min_stops..=max_stops);
            let base_id = (r as u64 + 1) * stride;
            let stops = (1..=count as u64)
                .map(|i| {
                    let (dlat, dlng) = if spread > 0.0 {
                        (rng.gen_range(-spread..=spread), rng.gen_range(-spread..=spread))
                    } else {
                        (0.0, 0.0)
                    };
                    Location::new(base_id + i, lat + dlat, lng + dlng)
                })
                .collect();
            HistoricalRoute::new(stops).with_depot(lat, lng)
        })
        .collect()
}

fn is_permutation(order: &[StopId], stops: &[StopId]) -> bool {
    let mut a = order.to_vec();
    let mut b = stops.to_vec();
    a.sort();
    b.sort();
    a == b
}
