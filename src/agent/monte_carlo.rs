use std::path::PathBuf;

use burn::{optim::Optimizer, tensor::backend::AutodiffBackend};
use log::info;

use crate::{
    assert_interval,
    decay::Epsilon,
    exploration::EpsilonGreedy,
    experience::Episode,
    maze::{Action, Position, Walls},
    value::{ActionEncoding, ApproxQ, QFunction, QTable, ReturnTally, TabularQ, ValueNet, ValueNetConfig},
};

use super::{persist_or_warn, Agent, FitOptions, Transition};

/// Configuration for the [`MonteCarloAgent`]
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloConfig {
    pub epsilon: Epsilon,
    /// Discount factor
    pub gamma: f32,
    /// Reward written over the last step of every episode that reaches the goal
    pub terminal_reward: f32,
    /// Goal-reaching episodes played purely at random before the estimate is consulted
    pub random_budget: u32,
    /// Grid size as `(width, height)`
    pub size: (usize, usize),
    /// Backing file of the action values, in memory only if `None`
    pub path: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            epsilon: Epsilon::Constant(0.1),
            gamma: 0.9,
            terminal_reward: 100.0,
            random_budget: 0,
            size: (8, 8),
            path: None,
            seed: None,
        }
    }
}

/// Every-visit Monte Carlo control
///
/// Rewards are collected over whole episodes and only the final step of a
/// goal-reaching episode is rewarded. On [`fit`](Agent::fit) the episodes are walked
/// from their end toward their start accumulating the discounted return
/// `G ← r + γ·G`, and each visited `(position, action)` pair folds the mean of its
/// returns into a running average.
pub struct MonteCarloAgent {
    q: Box<dyn QFunction>,
    policy: EpsilonGreedy,
    gamma: f32,
    terminal_reward: f32,
    size: (usize, usize),
    episode: u32,
}

impl MonteCarloAgent {
    /// Table-backed agent
    ///
    /// **Panics** if `epsilon` or `gamma` is not in the interval `[0,1]`
    pub fn new(config: MonteCarloConfig) -> Self {
        let (w, h) = config.size;
        let q = TabularQ::new(w, h, config.path.clone());
        Self::with_values(config, Box::new(q))
    }

    /// Agent whose action values are predicted by a network
    pub fn approximated<B, O>(
        config: MonteCarloConfig,
        net: &ValueNetConfig,
        optimizer: O,
        encoding: ActionEncoding,
        walls: Option<Walls>,
        device: B::Device,
    ) -> Self
    where
        B: AutodiffBackend,
        O: Optimizer<ValueNet<B>, B> + 'static,
    {
        let q = ApproxQ::<B, O>::new(
            config.size,
            encoding,
            walls,
            net,
            optimizer,
            device,
            config.path.clone(),
        );
        Self::with_values(config, Box::new(q))
    }

    fn with_values(config: MonteCarloConfig, q: Box<dyn QFunction>) -> Self {
        assert_interval!(config.gamma, 0.0, 1.0);
        Self {
            q,
            policy: EpsilonGreedy::seeded(config.epsilon, config.seed)
                .with_random_budget(config.random_budget),
            gamma: config.gamma,
            terminal_reward: config.terminal_reward,
            size: config.size,
            episode: 0,
        }
    }

    /// Sum the discounted returns of every visit in `experience`
    pub fn tally(&self, experience: &[Episode]) -> ReturnTally {
        let (w, h) = self.size;
        let mut tally = ReturnTally::new(w, h);
        for episode in experience {
            let mut ret = 0.0;
            for step in episode.iter().rev() {
                ret = step.reward + self.gamma * ret;
                tally.add(step.status, step.action, ret);
            }
        }
        tally
    }
}

impl Agent for MonteCarloAgent {
    fn finalize(&mut self, _status: Position, _score: f32) {
        self.episode += 1;
    }

    fn get_action(&mut self, status: Position, _actions_effective: &[Action], _is_previous: bool) -> Action {
        let q = &self.q;
        self.policy.choose(self.episode, |action| q.get(status, action))
    }

    fn get_reward(&mut self, transition: &Transition<'_>) -> f32 {
        if !transition.is_play {
            self.policy.consume_budget();
        }
        0.0
    }

    fn get_q(
        &mut self,
        status: Position,
        action: Action,
        _status_next: Position,
        _action_next: Option<Action>,
        _reward: f32,
    ) -> f32 {
        self.q.get(status, action)
    }

    fn adjust_experience(&mut self, episode: &mut Episode, _score: f32) {
        if let Some(last) = episode.last_mut() {
            last.reward = self.terminal_reward;
        }
    }

    fn fit(&mut self, experience: &[Episode], options: &FitOptions) {
        let tally = self.tally(experience);
        self.q.average_in(&tally);
        self.q.fit(options.epochs, options.size_batch);
        persist_or_warn(self.q.persist(), "monte carlo action values");

        let steps: usize = experience.iter().map(Episode::len).sum();
        info!(
            "fit #{}: monte carlo over {} episodes, {steps} steps",
            options.number,
            experience.len()
        );
    }

    fn q_table(&self) -> Option<QTable> {
        Some(self.q.table())
    }
}
