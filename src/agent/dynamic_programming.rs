use std::path::PathBuf;

use burn::{optim::Optimizer, tensor::backend::AutodiffBackend};
use log::{debug, info};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use strum::VariantArray;

use crate::{
    assert_interval,
    decay::Epsilon,
    env::TransitionModel,
    exploration::EpsilonGreedy,
    experience::Episode,
    maze::{Action, Position},
    value::{ApproxV, TabularV, VFunction, VTable, ValueNet, ValueNetConfig},
};

use super::{persist_or_warn, Agent, FitOptions, Transition};

/// How the candidate targets of a state are combined in a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DpBackup {
    /// Mean over every effective action
    #[default]
    Average,
    /// One effective action drawn at random
    Sample,
}

/// Configuration for the [`DynamicProgrammingAgent`]
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicProgrammingConfig {
    /// Discount factor
    pub gamma: f32,
    /// Step size toward the backed-up target
    pub eta: f32,
    /// A sweep whose largest change stays at or below this has converged
    pub gradient_minimum: f32,
    /// Reward for moving out of a dead end
    pub penalty: f32,
    /// Reward for stepping onto the goal
    pub goal_reward: f32,
    pub backup: DpBackup,
    /// Exploration when the agent plays live
    pub epsilon: Epsilon,
    pub random_budget: u32,
    pub path: Option<PathBuf>,
    /// Seeds both the sweep order and the live policy
    pub seed: Option<u64>,
}

impl Default for DynamicProgrammingConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            eta: 0.1,
            gradient_minimum: 0.001,
            penalty: -10.0,
            goal_reward: 1000.0,
            backup: DpBackup::Average,
            epsilon: Epsilon::Constant(0.1),
            random_budget: 0,
            path: None,
            seed: None,
        }
    }
}

/// Outcome of [`DynamicProgrammingAgent::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    /// Sweeps performed
    pub epochs: usize,
    pub converged: bool,
    /// Largest absolute change of the last sweep
    pub gradient: f32,
}

/// Value evaluation over a fully known transition model
///
/// Never needs played episodes: [`fit`](Agent::fit) sweeps every cell of the grid in
/// a freshly shuffled order, replacing `V(s)` in place by moving it toward the
/// backed-up target `r + γ·V(s')` of its effective actions. Sweeping stops once the
/// largest change falls to the threshold or the epoch limit is hit.
///
/// The agent can also play, greedily following a one-step lookahead on the values.
pub struct DynamicProgrammingAgent<M: TransitionModel> {
    model: M,
    v: Box<dyn VFunction>,
    policy: EpsilonGreedy,
    rng: StdRng,
    gamma: f32,
    eta: f32,
    gradient_minimum: f32,
    penalty: f32,
    goal_reward: f32,
    backup: DpBackup,
    episode: u32,
}

impl<M: TransitionModel> DynamicProgrammingAgent<M> {
    /// Table-backed agent
    ///
    /// **Panics** if `epsilon`, `gamma` or `eta` is not in the interval `[0,1]`
    pub fn new(model: M, config: DynamicProgrammingConfig) -> Self {
        let (w, h) = model.size();
        let v = TabularV::new(w, h, config.path.clone());
        Self::with_values(model, config, Box::new(v))
    }

    /// Agent whose state values are predicted by a network
    ///
    /// Each [`evaluate`](Self::evaluate) then performs a single sweep, queueing its
    /// targets, followed by one round of training.
    pub fn approximated<B, O>(
        model: M,
        config: DynamicProgrammingConfig,
        net: &ValueNetConfig,
        optimizer: O,
        device: B::Device,
    ) -> Self
    where
        B: AutodiffBackend,
        O: Optimizer<ValueNet<B>, B> + 'static,
    {
        let v = ApproxV::<B, O>::new(model.size(), net, optimizer, device, config.path.clone());
        Self::with_values(model, config, Box::new(v))
    }

    fn with_values(model: M, config: DynamicProgrammingConfig, v: Box<dyn VFunction>) -> Self {
        assert_interval!(config.gamma, 0.0, 1.0);
        assert_interval!(config.eta, 0.0, 1.0);
        Self {
            model,
            v,
            policy: EpsilonGreedy::seeded(config.epsilon, config.seed)
                .with_random_budget(config.random_budget),
            rng: config
                .seed
                .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
            gamma: config.gamma,
            eta: config.eta,
            gradient_minimum: config.gradient_minimum,
            penalty: config.penalty,
            goal_reward: config.goal_reward,
            backup: config.backup,
            episode: 0,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Reward of the modeled move from a cell with `actions` effective moves to `next`
    fn model_reward(&self, actions: &[Action], next: Position) -> f32 {
        if next == self.model.goal() {
            self.goal_reward
        } else if actions.len() <= 1 {
            self.penalty
        } else {
            0.0
        }
    }

    /// `r + γ·V(s')` of taking `action` at `status`, `None` if the move is blocked
    fn lookahead(&self, status: Position, actions: &[Action], action: Action) -> Option<f32> {
        let next = self.model.next_position(status, action)?;
        Some(self.model_reward(actions, next) + self.gamma * self.v.get(next))
    }

    /// One pass over every cell in random order
    ///
    /// Cells without any effective move are left alone.
    ///
    /// **Returns** the largest absolute gradient of the pass
    pub fn sweep(&mut self) -> f32 {
        let mut order = self.model.positions();
        order.shuffle(&mut self.rng);

        let mut gradient_max = 0.0f32;
        for status in order {
            let actions = self.model.actions_effective_at(status);
            let targets = actions
                .iter()
                .filter_map(|&a| self.lookahead(status, &actions, a))
                .collect::<Vec<_>>();

            let target = match self.backup {
                DpBackup::Average if !targets.is_empty() => {
                    targets.iter().sum::<f32>() / targets.len() as f32
                }
                DpBackup::Sample => match targets.choose(&mut self.rng) {
                    Some(&t) => t,
                    None => continue,
                },
                _ => continue,
            };

            let data = self.v.get(status);
            let gradient = target - data;
            gradient_max = gradient_max.max(gradient.abs());
            if self.v.deferred() {
                self.v.set(status, target);
            } else {
                self.v.set(status, data + self.eta * gradient);
            }
        }
        gradient_max
    }

    /// Sweep until converged or `epochs` sweeps have been made
    ///
    /// Approximated values only get one sweep per call, then train on its targets
    /// unless the sweep had already converged.
    pub fn evaluate(&mut self, epochs: usize, size_batch: usize) -> Convergence {
        let mut gradient = f32::INFINITY;
        for epoch in 1..=epochs {
            gradient = self.sweep();
            let converged = gradient <= self.gradient_minimum;

            if self.v.deferred() {
                if !converged {
                    self.v.fit(epochs, size_batch);
                }
                return Convergence {
                    epochs: epoch,
                    converged,
                    gradient,
                };
            }

            if epoch % 100 == 0 {
                debug!("sweep {epoch}/{epochs}: gradient {gradient}");
            }
            if converged {
                return Convergence {
                    epochs: epoch,
                    converged,
                    gradient,
                };
            }
        }
        Convergence {
            epochs,
            converged: false,
            gradient,
        }
    }
}

impl<M: TransitionModel> Agent for DynamicProgrammingAgent<M> {
    fn finalize(&mut self, _status: Position, _score: f32) {
        self.episode += 1;
    }

    fn get_action(&mut self, status: Position, _actions_effective: &[Action], _is_previous: bool) -> Action {
        let actions = self.model.actions_effective_at(status);
        let values = Action::VARIANTS
            .iter()
            .map(|&a| self.lookahead(status, &actions, a).unwrap_or(f32::NEG_INFINITY))
            .collect::<Vec<_>>();
        self.policy.choose(self.episode, |a| values[a.index()])
    }

    fn get_reward(&mut self, transition: &Transition<'_>) -> f32 {
        let mut reward = 0.0;
        if transition.is_stuck() {
            reward = self.penalty;
        }
        if !transition.is_play {
            reward = self.goal_reward;
            self.policy.consume_budget();
        }
        reward
    }

    fn fit(&mut self, _experience: &[Episode], options: &FitOptions) {
        let convergence = self.evaluate(options.epochs, options.size_batch);
        persist_or_warn(self.v.persist(), "dynamic programming state values");
        info!(
            "fit #{}: {} after {}/{} sweeps, gradient {}",
            options.number,
            if convergence.converged { "converged" } else { "stopped" },
            convergence.epochs,
            options.epochs,
            convergence.gradient
        );
    }

    fn necessary_experience(&self) -> bool {
        false
    }

    fn v_table(&self) -> Option<VTable> {
        Some(self.v.table())
    }
}
