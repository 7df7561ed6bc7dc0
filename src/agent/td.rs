use std::{collections::HashSet, path::PathBuf};

use burn::{optim::Optimizer, tensor::backend::AutodiffBackend};
use log::info;
use strum::VariantArray;

use crate::{
    assert_interval,
    decay::Epsilon,
    exploration::EpsilonGreedy,
    experience::Episode,
    maze::{Action, Position, Walls},
    value::{ActionEncoding, ApproxQ, QFunction, QTable, TabularQ, ValueNet, ValueNetConfig},
};

use super::{persist_or_warn, Agent, FitOptions, Transition};

/// Configuration for the [`TdAgent`]
#[derive(Debug, Clone, PartialEq)]
pub struct TdConfig {
    /// Bootstrap from the committed next action instead of the best one
    pub mode_sarsa: bool,
    pub epsilon: Epsilon,
    /// Discount factor
    pub gamma: f32,
    /// Learning rate
    pub eta: f32,
    pub random_budget: u32,
    /// Reward for walking into a wall or a dead end
    pub penalty: f32,
    /// Reward for reaching the goal
    pub goal_reward: f32,
    pub size: (usize, usize),
    pub path: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for TdConfig {
    fn default() -> Self {
        Self {
            mode_sarsa: false,
            epsilon: Epsilon::Constant(0.1),
            gamma: 0.9,
            eta: 0.1,
            random_budget: 0,
            penalty: -100.0,
            goal_reward: 10000.0,
            size: (8, 8),
            path: None,
            seed: None,
        }
    }
}

/// Temporal-difference control, Q-learning or SARSA
///
/// The action value is updated online on every step:
/// `Q(s,a) ← Q(s,a) + η·(r + γ·target − Q(s,a))`, where the target is
/// `max Q(s',·)` for Q-learning and `Q(s',a')` of the committed next action for
/// SARSA. Approximators queue the updated values and learn them on
/// [`fit`](Agent::fit).
pub struct TdAgent {
    q: Box<dyn QFunction>,
    policy: EpsilonGreedy,
    mode_sarsa: bool,
    gamma: f32,
    eta: f32,
    penalty: f32,
    goal_reward: f32,
    size: (usize, usize),
    /// The last action handed out, replayed on `is_previous`
    action: Option<Action>,
    /// The last priced transition ended the episode
    terminal: bool,
    episode: u32,
}

impl TdAgent {
    /// Table-backed agent
    ///
    /// **Panics** if `epsilon`, `gamma` or `eta` is not in the interval `[0,1]`
    pub fn new(config: TdConfig) -> Self {
        let (w, h) = config.size;
        let q = TabularQ::new(w, h, config.path.clone());
        Self::with_values(config, Box::new(q))
    }

    /// Agent whose action values are predicted by a network
    pub fn approximated<B, O>(
        config: TdConfig,
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

    fn with_values(config: TdConfig, q: Box<dyn QFunction>) -> Self {
        assert_interval!(config.gamma, 0.0, 1.0);
        assert_interval!(config.eta, 0.0, 1.0);
        Self {
            q,
            policy: EpsilonGreedy::seeded(config.epsilon, config.seed)
                .with_random_budget(config.random_budget),
            mode_sarsa: config.mode_sarsa,
            gamma: config.gamma,
            eta: config.eta,
            penalty: config.penalty,
            goal_reward: config.goal_reward,
            size: config.size,
            action: None,
            terminal: false,
            episode: 0,
        }
    }

    pub fn random_budget(&self) -> u32 {
        self.policy.random_budget()
    }

    /// Discounted returns of one episode, without touching the learned values
    ///
    /// The episode is walked backward and each pair keeps the first return it
    /// meets, that is the return following its last visit.
    pub fn q_table_from_experience(&self, episode: &Episode) -> QTable {
        let (w, h) = self.size;
        let mut table = QTable::zeros(w, h);
        let mut seen = HashSet::new();
        let mut ret = 0.0;
        for step in episode.iter().rev() {
            ret = step.reward + self.gamma * ret;
            if seen.insert((step.status, step.action)) {
                table.set(step.status, step.action, ret);
            }
        }
        table
    }

    fn target(&self, status_next: Position, action_next: Option<Action>) -> f32 {
        if self.terminal {
            return 0.0;
        }
        if self.mode_sarsa {
            action_next.map_or(0.0, |a| self.q.get(status_next, a))
        } else {
            Action::VARIANTS
                .iter()
                .map(|&a| self.q.get(status_next, a))
                .fold(f32::NEG_INFINITY, f32::max)
        }
    }
}

impl Agent for TdAgent {
    fn initialize(&mut self) {
        self.action = None;
        self.terminal = false;
    }

    fn finalize(&mut self, _status: Position, _score: f32) {
        self.episode += 1;
    }

    fn get_action(&mut self, status: Position, _actions_effective: &[Action], is_previous: bool) -> Action {
        if is_previous {
            if let Some(action) = self.action {
                return action;
            }
        }
        let q = &self.q;
        let action = self.policy.choose(self.episode, |a| q.get(status, a));
        self.action = Some(action);
        action
    }

    fn get_reward(&mut self, transition: &Transition<'_>) -> f32 {
        let mut reward = 0.0;
        if transition.is_stuck() {
            reward = self.penalty;
        }
        self.terminal = !transition.is_play;
        if self.terminal {
            reward = self.goal_reward;
            self.policy.consume_budget();
        }
        reward
    }

    fn get_q(
        &mut self,
        status: Position,
        action: Action,
        status_next: Position,
        action_next: Option<Action>,
        reward: f32,
    ) -> f32 {
        let q = self.q.get(status, action);
        let target = self.target(status_next, action_next);
        let q = q + self.eta * (reward + self.gamma * target - q);
        self.q.set(status, action, q);
        q
    }

    fn fit(&mut self, experience: &[Episode], options: &FitOptions) {
        self.q.fit(options.epochs, options.size_batch);
        persist_or_warn(self.q.persist(), "temporal difference action values");
        info!(
            "fit #{}: {} after {} episodes",
            options.number,
            if self.mode_sarsa { "sarsa" } else { "q-learning" },
            experience.len()
        );
    }

    fn mode_sarsa(&self) -> bool {
        self.mode_sarsa
    }

    fn q_table(&self) -> Option<QTable> {
        Some(self.q.table())
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamConfig,
    };

    use super::*;
    use crate::experience::tests::step;

    type TestBackend = Autodiff<NdArray>;

    const S: Position = Position::new(0, 0);
    const S1: Position = Position::new(1, 0);

    fn agent(mode_sarsa: bool) -> TdAgent {
        TdAgent::new(TdConfig {
            mode_sarsa,
            size: (3, 3),
            seed: Some(4),
            ..Default::default()
        })
    }

    fn transition(is_play: bool, can_action: bool, next: &[Action]) -> Transition<'_> {
        Transition {
            status: S,
            action: Action::Right,
            can_action,
            status_next: S1,
            is_play,
            score: 0.0,
            actions_effective_next: next,
        }
    }

    #[test]
    fn online_update_from_zero() {
        for mode_sarsa in [false, true] {
            let mut agent = agent(mode_sarsa);
            let q = agent.get_q(S, Action::Right, S1, Some(Action::Down), 10.0);
            assert_eq!(q, 1.0);
            assert_eq!(agent.q_table().unwrap().get(S, Action::Right), 1.0);
        }
    }

    #[test]
    fn bootstrap_targets_differ_by_mode() {
        let mut q_learning = agent(false);
        let mut sarsa = agent(true);
        for agent in [&mut q_learning, &mut sarsa] {
            agent.q.set(S1, Action::Down, 10.0);
            agent.q.set(S1, Action::Left, 20.0);
        }

        // 0.1 * (0 + 0.9 * 20)
        let q = q_learning.get_q(S, Action::Right, S1, Some(Action::Down), 0.0);
        assert!((q - 1.8).abs() < 1e-6);
        // 0.1 * (0 + 0.9 * 10)
        let q = sarsa.get_q(S, Action::Right, S1, Some(Action::Down), 0.0);
        assert!((q - 0.9).abs() < 1e-6);
    }

    #[test]
    fn terminal_transition_does_not_bootstrap() {
        let mut agent = agent(false);
        agent.q.set(S1, Action::Left, 50.0);
        let reward = agent.get_reward(&transition(false, true, &[Action::Up, Action::Left]));
        assert_eq!(reward, 10000.0);
        assert_eq!(agent.get_q(S, Action::Right, S1, None, reward), 1000.0);
    }

    #[test]
    fn rewards_shape_walls_dead_ends_and_goal() {
        let mut agent = agent(false);
        let open = [Action::Up, Action::Down];
        assert_eq!(agent.get_reward(&transition(true, true, &open)), 0.0);
        assert_eq!(agent.get_reward(&transition(true, false, &open)), -100.0);
        assert_eq!(agent.get_reward(&transition(true, true, &[Action::Left])), -100.0);
        assert_eq!(agent.get_reward(&transition(false, true, &[Action::Left])), 10000.0);
    }

    #[test]
    fn sarsa_replays_committed_action() {
        let mut sarsa = TdAgent::new(TdConfig {
            mode_sarsa: true,
            epsilon: Epsilon::Constant(1.0),
            size: (3, 3),
            seed: Some(8),
            ..Default::default()
        });
        // Nothing cached yet, so the flag is ignored
        let first = sarsa.get_action(S, &[], true);
        assert_eq!(sarsa.action, Some(first));
        for _ in 0..20 {
            assert_eq!(sarsa.get_action(S, &[], true), first);
        }

        sarsa.initialize();
        assert!(sarsa.action.is_none(), "Every episode starts uncommitted");
    }

    #[test]
    fn configured_epsilon_decays_per_episode() {
        let mut agent = TdAgent::new(TdConfig {
            epsilon: Epsilon::linear(1.0, 1.0, 0.0).unwrap(),
            size: (3, 3),
            seed: Some(9),
            ..Default::default()
        });
        // All values tie, so the greedy action is Up
        for _ in 0..20 {
            assert_ne!(agent.get_action(S, &[], false), Action::Up);
        }
        agent.finalize(S, 0.0);
        for _ in 0..20 {
            assert_eq!(agent.get_action(S, &[], false), Action::Up);
        }
    }

    #[test]
    fn goal_spends_random_budget() {
        let mut agent = TdAgent::new(TdConfig {
            random_budget: 2,
            size: (3, 3),
            seed: Some(5),
            ..Default::default()
        });
        let open = [Action::Up, Action::Down];
        agent.get_reward(&transition(true, true, &open));
        assert_eq!(agent.random_budget(), 2);
        agent.get_reward(&transition(false, true, &open));
        assert_eq!(agent.random_budget(), 1);
    }

    #[test]
    fn returns_from_one_episode() {
        let agent = agent(false);
        let mut episode = Episode::new();
        episode.push(step(S, Action::Right, S1, 0.0));
        episode.push(step(S1, Action::Left, S, 0.0));
        episode.push(step(S, Action::Right, S1, 10.0));

        let table = agent.q_table_from_experience(&episode);
        assert_eq!(table.get(S, Action::Right), 10.0, "Latest visit wins");
        assert!((table.get(S1, Action::Left) - 9.0).abs() < 1e-6);
        assert_eq!(agent.q_table().unwrap(), QTable::zeros(3, 3));
    }

    #[test]
    fn approximated_updates_wait_for_fit() {
        let mut agent = TdAgent::approximated::<TestBackend, _>(
            TdConfig {
                size: (3, 3),
                seed: Some(4),
                ..Default::default()
            },
            &ValueNetConfig::new(),
            AdamConfig::new().init::<TestBackend, ValueNet<TestBackend>>(),
            ActionEncoding::OneHot,
            None,
            Default::default(),
        );
        assert_eq!(agent.get_q(S, Action::Right, S1, None, 10.0), 1.0);
        agent.get_q(S1, Action::Down, Position::new(1, 1), None, 10.0);
        assert_eq!(agent.q.pending(), 2, "One example per step");
        assert_eq!(agent.q.get(S, Action::Right), 0.0);

        let options = FitOptions {
            epochs: 20,
            ..Default::default()
        };
        agent.fit(&[], &options);
        assert_eq!(agent.q.pending(), 0);
        assert!(agent.q_table().unwrap().values().iter().any(|&v| v != 0.0));
    }
}
