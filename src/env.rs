use crate::{
    maze::{Action, Position},
    value::QTable,
};

/// A turn-based grid environment an agent plays through
///
/// The state space is the set of grid cells and the action space is the four
/// moves of [`Action`]. Rewards are not part of the environment: agents compute
/// their own from the transition outcome, and [`score`](Environment::score) only
/// carries an intrinsic score for environments that have one.
pub trait Environment {
    /// Begin a new episode from the fixed origin
    fn start(&mut self);

    /// A copy of the current position
    fn status(&self) -> Position;

    /// `true` while the episode is running, `false` once the goal is reached
    fn is_play(&self) -> bool;

    /// Intrinsic score, distinct from the RL reward
    fn score(&self) -> f32 {
        0.0
    }

    /// Number of effective moves in the current episode
    fn count(&self) -> usize;

    /// Attempt a move
    ///
    /// **Returns** whether the move was effective
    fn set_action(&mut self, action: Action) -> bool;

    /// The moves that would currently succeed
    ///
    /// An empty list means the player is boxed in.
    fn actions_effective(&self) -> Vec<Action>;

    /// Text rendering, optionally overlaid with action values
    fn display(&self, q_table: Option<&QTable>) -> String;
}

/// Known dynamics of a deterministic grid, queried for arbitrary states
///
/// Needed by planning agents that never play live episodes.
pub trait TransitionModel {
    /// Grid size as `(width, height)`
    fn size(&self) -> (usize, usize);

    /// The terminal cell
    fn goal(&self) -> Position;

    /// The cell reached by taking `action` from `pos`, or `None` if the move is blocked
    fn next_position(&self, pos: Position, action: Action) -> Option<Position>;

    /// The moves that would succeed from `pos`
    fn actions_effective_at(&self, pos: Position) -> Vec<Action>;

    /// Every cell of the grid in row-major order
    fn positions(&self) -> Vec<Position> {
        let (w, h) = self.size();
        (0..h)
            .flat_map(|y| (0..w).map(move |x| Position::new(x, y)))
            .collect()
    }
}
