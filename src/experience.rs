use crate::maze::{Action, Position};

/// A single recorded step of an episode
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Position before the action
    pub status: Position,
    /// Moves that were effective before the action
    pub actions_effective: Vec<Action>,
    /// The action taken
    pub action: Action,
    /// Position after the action
    pub status_next: Position,
    /// The action already committed for the next step, SARSA only
    pub action_next: Option<Action>,
    /// Moves effective after the action
    pub actions_effective_next: Vec<Action>,
    /// Reward the agent assigned to this transition
    pub reward: f32,
    /// The agent's value estimate at the time of the step
    pub q: f32,
}

/// An append-only record of one agent's steps through one episode
///
/// Every step carries all of its fields, so the per-field sequences always have equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Episode {
    steps: Vec<Step>,
}

impl Episode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps from the start of the episode to its end; call `.rev()` to walk backwards
    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The final step, the only one reward shaping may rewrite after the fact
    pub fn last_mut(&mut self) -> Option<&mut Step> {
        self.steps.last_mut()
    }

    pub fn total_reward(&self) -> f32 {
        self.steps.iter().map(|s| s.reward).sum()
    }
}

impl<'a> IntoIterator for &'a Episode {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Episodes recorded by one call to [`Control::play`](crate::control::Control::play),
/// indexed `[agent][episode]`
pub type Experience = Vec<Vec<Episode>>;
