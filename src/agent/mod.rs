mod dynamic_programming;
mod human;
mod monte_carlo;
mod random;
mod td;

use std::{fmt, path::PathBuf, str::FromStr};

use log::warn;
use strum::VariantArray;

use crate::{
    env::TransitionModel,
    error::{Error, Result},
    experience::Episode,
    maze::{Action, Maze, Position},
    value::{QTable, VTable},
};

pub use dynamic_programming::{
    Convergence, DpBackup, DynamicProgrammingAgent, DynamicProgrammingConfig,
};
pub use human::HumanAgent;
pub use monte_carlo::{MonteCarloAgent, MonteCarloConfig};
pub use random::RandomAgent;
pub use td::{TdAgent, TdConfig};

/// Everything an agent may look at when pricing a transition
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    /// Position before the action
    pub status: Position,
    pub action: Action,
    /// Whether the move was effective
    pub can_action: bool,
    /// Position after the action
    pub status_next: Position,
    /// `false` once the goal has been reached
    pub is_play: bool,
    pub score: f32,
    /// Moves effective after the action
    pub actions_effective_next: &'a [Action],
}

impl Transition<'_> {
    /// The player walked into a wall or ended up in a dead end
    pub fn is_stuck(&self) -> bool {
        self.actions_effective_next.len() <= 1 || !self.can_action
    }
}

/// Hyperparameters handed to [`Agent::fit`]
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Training passes for approximators, maximum sweeps for planning agents
    pub epochs: usize,
    /// Mini-batch size for approximators
    pub size_batch: usize,
    /// Index of this fit call, used only for reporting
    pub number: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 100,
            size_batch: 20,
            number: 1,
        }
    }
}

/// The contract every agent honors so the control loop can treat them uniformly
///
/// Only [`get_action`](Agent::get_action) is required; everything else defaults to a no-op.
pub trait Agent {
    /// Called before every episode
    fn initialize(&mut self) {}

    /// Called after every episode, whether or not the goal was reached
    fn finalize(&mut self, _status: Position, _score: f32) {}

    /// Choose the next action
    ///
    /// With `is_previous`, an agent that already committed to an action replays it instead of sampling anew.
    fn get_action(&mut self, status: Position, actions_effective: &[Action], is_previous: bool) -> Action;

    /// Price a transition
    fn get_reward(&mut self, _transition: &Transition<'_>) -> f32 {
        0.0
    }

    /// Value estimate to record with the step, updating online where the algorithm does so
    fn get_q(
        &mut self,
        _status: Position,
        _action: Action,
        _status_next: Position,
        _action_next: Option<Action>,
        _reward: f32,
    ) -> f32 {
        0.0
    }

    /// Reshape the record of an episode that reached the goal
    fn adjust_experience(&mut self, _episode: &mut Episode, _score: f32) {}

    /// Learn from the episodes recorded for this agent
    fn fit(&mut self, _experience: &[Episode], _options: &FitOptions) {}

    /// `true` if the next action must be chosen before the value update
    fn mode_sarsa(&self) -> bool {
        false
    }

    /// `false` for agents that learn from a model rather than from played episodes
    fn necessary_experience(&self) -> bool {
        true
    }

    fn q_table(&self) -> Option<QTable> {
        None
    }

    fn v_table(&self) -> Option<VTable> {
        None
    }
}

fn persist_or_warn(result: Result<()>, what: &str) {
    if let Err(err) = result {
        warn!("could not persist {what}: {err}");
    }
}

/// The agent variants, named the way a driver selects them
#[derive(VariantArray, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Random,
    Human,
    MonteCarlo,
    QLearning,
    Sarsa,
    DynamicProgramming,
}

impl AgentKind {
    pub fn name(self) -> &'static str {
        match self {
            AgentKind::Random => "random",
            AgentKind::Human => "human",
            AgentKind::MonteCarlo => "monte_carlo",
            AgentKind::QLearning => "q_learning",
            AgentKind::Sarsa => "sarsa",
            AgentKind::DynamicProgramming => "dynamic_programming",
        }
    }

    /// Build a table-backed agent with default hyperparameters for `maze`
    ///
    /// With a `directory`, tables are loaded from and saved to a per-kind file inside it.
    pub fn build(self, maze: &Maze, directory: Option<PathBuf>, seed: Option<u64>) -> Box<dyn Agent> {
        let size = maze.size();
        let file = |name: &str| directory.as_ref().map(|d| d.join(name));
        match self {
            AgentKind::Random => Box::new(RandomAgent::new(seed)),
            AgentKind::Human => Box::new(HumanAgent::stdin()),
            AgentKind::MonteCarlo => Box::new(MonteCarloAgent::new(MonteCarloConfig {
                size,
                path: file("monte_carlo_q.bin"),
                seed,
                ..Default::default()
            })),
            AgentKind::QLearning | AgentKind::Sarsa => Box::new(TdAgent::new(TdConfig {
                mode_sarsa: self == AgentKind::Sarsa,
                size,
                path: file(if self == AgentKind::Sarsa {
                    "td_q_sarsa.bin"
                } else {
                    "td_q.bin"
                }),
                seed,
                ..Default::default()
            })),
            AgentKind::DynamicProgramming => Box::new(DynamicProgrammingAgent::new(
                maze.clone(),
                DynamicProgrammingConfig {
                    path: file("dynamic_programming_v.bin"),
                    seed,
                    ..Default::default()
                },
            )),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownAgentKind {
                input: s.to_string(),
                expected: Self::VARIANTS
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}
