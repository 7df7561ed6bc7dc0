use rand::{rngs::StdRng, Rng, SeedableRng};
use strum::VariantArray;

use crate::{decay::Epsilon, maze::Action};

use super::Choice;

/// Pick the action with the highest value
///
/// Ties go to the first action in index order, since later actions must be strictly greater to win.
pub fn greedy(mut value: impl FnMut(Action) -> f32) -> Action {
    let mut best = Action::Up;
    let mut best_value = value(best);
    for &action in &Action::VARIANTS[1..] {
        let v = value(action);
        if best_value < v {
            best_value = v;
            best = action;
        }
    }
    best
}

/// Epsilon greedy exploration policy with a warm-up budget of purely random decisions
///
/// While the budget is positive every decision is uniform over all four actions and
/// the value estimate is never consulted. The budget is spent one unit per episode
/// that reaches the goal, see [`consume_budget`](Self::consume_budget).
///
/// Once the budget is exhausted, the greedy action is overridden with probability
/// epsilon by one of the three other actions, drawn uniformly.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    epsilon: Epsilon,
    random_budget: u32,
    rng: StdRng,
}

impl EpsilonGreedy {
    /// Initialize epsilon greedy policy with an epsilon schedule and a random source
    ///
    /// **Panics** if the schedule is invalid, see [`Epsilon::validate`]
    pub fn new(epsilon: Epsilon, rng: StdRng) -> Self {
        if let Err(err) = epsilon.validate() {
            panic!("{err}");
        }
        Self {
            epsilon,
            random_budget: 0,
            rng,
        }
    }

    /// Policy seeded with `seed`, or with fresh entropy if there is none
    pub fn seeded(epsilon: Epsilon, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self::new(epsilon, rng)
    }

    /// Fixed epsilon policy
    pub fn constant(epsilon: f32, seed: Option<u64>) -> Self {
        Self::seeded(Epsilon::Constant(epsilon), seed)
    }

    /// Set the number of goal-reaching episodes played purely at random
    pub fn with_random_budget(mut self, budget: u32) -> Self {
        self.random_budget = budget;
        self
    }

    pub fn random_budget(&self) -> u32 {
        self.random_budget
    }

    /// Spend one unit of the random budget
    pub fn consume_budget(&mut self) {
        self.random_budget = self.random_budget.saturating_sub(1);
    }

    /// A uniformly random action
    pub fn random_action(&mut self) -> Action {
        Action::VARIANTS[self.rng.gen_range(0..Action::COUNT)]
    }

    /// Draw against epsilon for the current episode
    pub fn decide(&mut self, episode: u32) -> Choice {
        let epsilon = self.epsilon.value(episode);
        if self.rng.gen::<f32>() < epsilon {
            Choice::Explore
        } else {
            Choice::Exploit
        }
    }

    /// Invoke the policy for the current episode given a value for each action
    pub fn choose(&mut self, episode: u32, value: impl FnMut(Action) -> f32) -> Action {
        if self.random_budget > 0 {
            return self.random_action();
        }

        let best = greedy(value);
        match self.decide(episode) {
            Choice::Exploit => best,
            Choice::Explore => {
                let shift = self.rng.gen_range(1..Action::COUNT);
                Action::VARIANTS[(best.index() + shift) % Action::COUNT]
            }
        }
    }
}
