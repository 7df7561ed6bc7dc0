mod render;
mod walls;

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::VariantArray;

use crate::{
    env::{Environment, TransitionModel},
    value::QTable,
};

pub use walls::Walls;

/// A cell of the grid, `(0, 0)` being the top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four moves, numbered clockwise from up
#[derive(VariantArray, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Action {
    /// Number of actions
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }

    /// Map an index in `0..4` back to its action
    pub fn from_index(index: usize) -> Option<Self> {
        Self::VARIANTS.get(index).copied()
    }
}

impl TryFrom<usize> for Action {
    type Error = usize;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::from_index(value).ok_or(value)
    }
}

/// A rectangular maze walked from the top-left corner to the bottom-right corner
///
/// Intended to be driven by [`Control`](crate::control::Control). Rewards are left to the agents,
/// so the intrinsic score is always `0`.
#[derive(Debug, Clone)]
pub struct Maze {
    walls: Walls,
    position: Position,
    count: usize,
    is_play: bool,
}

impl Maze {
    /// The fixed starting cell
    pub const ORIGIN: Position = Position::new(0, 0);

    pub fn new(walls: Walls) -> Self {
        Self {
            walls,
            position: Self::ORIGIN,
            count: 0,
            is_play: false,
        }
    }

    /// A maze without inner walls
    ///
    /// **Errors** if the grid has no cells
    pub fn open(width: usize, height: usize) -> crate::Result<Self> {
        Ok(Self::new(Walls::open(width, height)?))
    }

    pub fn walls(&self) -> &Walls {
        &self.walls
    }

    /// Attempt to move one cell, accepting raw direction numbers
    ///
    /// Directions outside `0..4` are silently ineffective.
    pub fn set_action_raw(&mut self, direction: usize) -> bool {
        match Action::try_from(direction) {
            Ok(action) => self.set_action(action),
            Err(_) => {
                self.check_goal();
                false
            }
        }
    }

    /// Render the grid, optionally overlaying the four action values of each cell
    pub fn render(&self, q_table: Option<&QTable>) -> String {
        render::render(self, q_table)
    }

    fn check_goal(&mut self) {
        if self.position == self.goal() {
            self.is_play = false;
        }
    }
}

impl Default for Maze {
    fn default() -> Self {
        Self::new(Walls::default())
    }
}

impl fmt::Display for Maze {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(None))
    }
}

impl Environment for Maze {
    fn start(&mut self) {
        self.position = Self::ORIGIN;
        self.count = 0;
        self.is_play = true;
    }

    fn status(&self) -> Position {
        self.position
    }

    fn is_play(&self) -> bool {
        self.is_play
    }

    fn count(&self) -> usize {
        self.count
    }

    fn set_action(&mut self, action: Action) -> bool {
        let moved = match self.next_position(self.position, action) {
            Some(next) => {
                self.position = next;
                self.count += 1;
                true
            }
            None => false,
        };
        self.check_goal();
        moved
    }

    fn actions_effective(&self) -> Vec<Action> {
        self.actions_effective_at(self.position)
    }

    fn display(&self, q_table: Option<&QTable>) -> String {
        self.render(q_table)
    }
}

impl TransitionModel for Maze {
    fn size(&self) -> (usize, usize) {
        (self.walls.width(), self.walls.height())
    }

    fn goal(&self) -> Position {
        Position::new(self.walls.width() - 1, self.walls.height() - 1)
    }

    fn next_position(&self, pos: Position, action: Action) -> Option<Position> {
        if self.walls.blocked(pos, action) {
            return None;
        }
        let Position { x, y } = pos;
        Some(match action {
            Action::Up => Position::new(x, y - 1),
            Action::Right => Position::new(x + 1, y),
            Action::Down => Position::new(x, y + 1),
            Action::Left => Position::new(x - 1, y),
        })
    }

    fn actions_effective_at(&self, pos: Position) -> Vec<Action> {
        Action::VARIANTS
            .iter()
            .copied()
            .filter(|&a| !self.walls.blocked(pos, a))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn start_resets_episode() {
        let mut maze = Maze::open(3, 3).unwrap();
        assert!(!maze.is_play(), "Not playing before start");

        maze.start();
        assert!(maze.set_action(Action::Right));
        assert!(maze.set_action(Action::Down));
        assert_eq!(maze.count(), 2);

        maze.start();
        assert_eq!(maze.status(), Maze::ORIGIN);
        assert_eq!(maze.count(), 0);
        assert!(maze.is_play());
    }

    #[test]
    fn blocked_move_changes_nothing() {
        let mut maze = Maze::default();
        maze.start();
        for action in [Action::Up, Action::Left, Action::Down] {
            assert!(!maze.set_action(action), "{action:?} is walled off");
            assert_eq!(maze.status(), Maze::ORIGIN);
            assert_eq!(maze.count(), 0);
        }
        assert!(maze.set_action(Action::Right));
        assert_eq!(maze.status(), Position::new(1, 0));
        assert_eq!(maze.count(), 1);
    }

    #[test]
    fn raw_directions_outside_range_are_ineffective() {
        let mut maze = Maze::open(2, 2).unwrap();
        maze.start();
        assert!(!maze.set_action_raw(4));
        assert!(!maze.set_action_raw(usize::MAX));
        assert_eq!(maze.count(), 0);
        assert!(maze.set_action_raw(1));
        assert_eq!(maze.status(), Position::new(1, 0));
    }

    #[test]
    fn goal_ends_play_until_restart() {
        let mut maze = Maze::open(2, 2).unwrap();
        maze.start();
        maze.set_action(Action::Right);
        assert!(maze.is_play());
        maze.set_action(Action::Down);
        assert!(!maze.is_play(), "Reaching the goal ends the episode");

        maze.set_action(Action::Up);
        assert!(!maze.is_play(), "Only start resumes play");
        maze.start();
        assert!(maze.is_play());
    }

    #[test]
    fn status_is_a_copy() {
        let mut maze = Maze::open(3, 3).unwrap();
        maze.start();
        let mut status = maze.status();
        status.x = 2;
        status.y = 2;
        assert_ne!(status, maze.status());
        assert_eq!(maze.status(), Maze::ORIGIN);
        assert!(maze.is_play());
    }

    #[test]
    fn empty_grids_are_rejected() {
        assert!(matches!(Maze::open(0, 3), Err(Error::WallShape { .. })));
        assert!(matches!(Maze::open(3, 0), Err(Error::WallShape { .. })));
        assert!(Maze::open(1, 1).is_ok());
    }

    #[test]
    fn effective_actions_follow_walls() {
        let mut maze = Maze::open(3, 3).unwrap();
        maze.start();
        assert_eq!(maze.actions_effective(), vec![Action::Right, Action::Down]);
        assert_eq!(
            maze.actions_effective_at(Position::new(1, 1)),
            Action::VARIANTS.to_vec()
        );
        assert_eq!(maze.actions_effective_at(Position::new(2, 2)), vec![Action::Up, Action::Left]);
    }

    #[test]
    fn action_index_round_trip() {
        for (i, action) in Action::VARIANTS.iter().enumerate() {
            assert_eq!(action.index(), i);
            assert_eq!(Action::try_from(i), Ok(*action));
        }
        assert_eq!(Action::try_from(7), Err(7));
    }
}
