use rand::{rngs::StdRng, Rng, SeedableRng};
use strum::VariantArray;

use crate::maze::{Action, Position};

use super::Agent;

/// Ignores everything and draws a uniform action on every call
#[derive(Debug, Clone)]
pub struct RandomAgent {
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        }
    }
}

impl Agent for RandomAgent {
    fn get_action(&mut self, _status: Position, _actions_effective: &[Action], _is_previous: bool) -> Action {
        Action::VARIANTS[self.rng.gen_range(0..Action::COUNT)]
    }
}
