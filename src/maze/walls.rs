use ndarray::Array2;

use crate::error::{Error, Result};

use super::{Action, Position};

/// Horizontal edge flags of the default layout, indexed `[x][y]` where `y` is the edge above row `y`
const DEFAULT_HORIZONTAL: [[u8; 9]; 8] = [
    [1, 1, 0, 0, 0, 0, 0, 0, 1],
    [1, 1, 0, 1, 1, 0, 0, 1, 1],
    [1, 0, 0, 0, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 1, 1, 0, 1, 0, 1, 1],
    [1, 0, 0, 1, 1, 0, 0, 1, 1],
    [1, 0, 0, 0, 0, 0, 1, 1, 1],
    [1, 0, 0, 0, 0, 1, 0, 0, 1],
];

/// Vertical edge flags of the default layout, indexed `[y][x]` where `x` is the edge left of column `x`
const DEFAULT_VERTICAL: [[u8; 9]; 8] = [
    [1, 0, 0, 0, 1, 0, 1, 0, 1],
    [1, 0, 1, 1, 0, 1, 1, 1, 1],
    [1, 1, 1, 0, 0, 0, 1, 1, 1],
    [1, 0, 0, 0, 0, 0, 0, 1, 1],
    [1, 1, 0, 0, 1, 0, 1, 1, 1],
    [1, 1, 1, 0, 0, 1, 1, 0, 1],
    [1, 1, 0, 0, 0, 1, 0, 1, 1],
    [1, 0, 0, 0, 0, 0, 0, 1, 1],
];

/// The fixed topology of a maze
///
/// - `horizontal` has shape `[W, H + 1]`; `horizontal[[x, y]]` blocks movement between rows `y - 1` and `y`
/// - `vertical` has shape `[H, W + 1]`; `vertical[[y, x]]` blocks movement between columns `x - 1` and `x`
///
/// Walls never change once a maze is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Walls {
    horizontal: Array2<bool>,
    vertical: Array2<bool>,
}

impl Walls {
    /// Build walls from edge matrices
    ///
    /// **Errors** if the two matrices do not describe the same `W x H` grid
    pub fn new(horizontal: Array2<bool>, vertical: Array2<bool>) -> Result<Self> {
        let (width, h_edges) = horizontal.dim();
        let (height, v_edges) = vertical.dim();
        let shape_error = |reason: String| Error::WallShape {
            width,
            height,
            reason,
        };

        if width == 0 || height == 0 {
            return Err(shape_error("grid must have at least one cell".into()));
        }
        if h_edges != height + 1 {
            return Err(shape_error(format!(
                "horizontal edges need {} rows per column, got {h_edges}",
                height + 1
            )));
        }
        if v_edges != width + 1 {
            return Err(shape_error(format!(
                "vertical edges need {} columns per row, got {v_edges}",
                width + 1
            )));
        }

        Ok(Self {
            horizontal,
            vertical,
        })
    }

    /// Build walls from `0`/`1` flag rows, laid out the same way as the matrices in [`Walls::new`]
    pub fn from_flags<H, V>(horizontal: &[H], vertical: &[V]) -> Result<Self>
    where
        H: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        Self::new(to_matrix(horizontal)?, to_matrix(vertical)?)
    }

    /// A `width x height` grid enclosed by its border and otherwise open
    ///
    /// **Errors** if the grid has no cells
    pub fn open(width: usize, height: usize) -> Result<Self> {
        let horizontal =
            Array2::from_shape_fn((width, height + 1), |(_, y)| y == 0 || y == height);
        let vertical = Array2::from_shape_fn((height, width + 1), |(_, x)| x == 0 || x == width);
        Self::new(horizontal, vertical)
    }

    pub fn width(&self) -> usize {
        self.horizontal.dim().0
    }

    pub fn height(&self) -> usize {
        self.vertical.dim().0
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width() && pos.y < self.height()
    }

    /// Check whether moving from `pos` in direction `action` is blocked
    ///
    /// Leaving the grid always counts as blocked, even if a border flag is missing.
    pub fn blocked(&self, pos: Position, action: Action) -> bool {
        if !self.contains(pos) {
            return true;
        }
        let Position { x, y } = pos;
        match action {
            Action::Up => y == 0 || self.horizontal[[x, y]],
            Action::Right => x + 1 >= self.width() || self.vertical[[y, x + 1]],
            Action::Down => y + 1 >= self.height() || self.horizontal[[x, y + 1]],
            Action::Left => x == 0 || self.vertical[[y, x]],
        }
    }

    /// Set or clear the edge crossed when moving from `pos` in direction `action`
    pub fn set(&mut self, pos: Position, action: Action, blocked: bool) {
        let Position { x, y } = pos;
        let edge = match action {
            Action::Up => self.horizontal.get_mut([x, y]),
            Action::Right => self.vertical.get_mut([y, x + 1]),
            Action::Down => self.horizontal.get_mut([x, y + 1]),
            Action::Left => self.vertical.get_mut([y, x]),
        };
        if let Some(edge) = edge {
            *edge = blocked;
        }
    }

    /// Flag of the edge above cell `(x, y)`, or below the last row when `y == H`
    pub fn horizontal(&self, x: usize, y: usize) -> bool {
        self.horizontal[[x, y]]
    }

    /// Flag of the edge left of cell `(x, y)`, or right of the last column when `x == W`
    pub fn vertical(&self, x: usize, y: usize) -> bool {
        self.vertical[[y, x]]
    }
}

impl Default for Walls {
    /// The 8x8 layout the laboratory ships with
    fn default() -> Self {
        Self::from_flags(&DEFAULT_HORIZONTAL, &DEFAULT_VERTICAL)
            .expect("default layout is a consistent 8x8 grid")
    }
}

fn to_matrix<T: AsRef<[u8]>>(rows: &[T]) -> Result<Array2<bool>> {
    let cols = rows.first().map_or(0, |r| r.as_ref().len());
    let flat = rows
        .iter()
        .flat_map(|r| r.as_ref().iter().map(|&f| f != 0))
        .collect::<Vec<_>>();
    Array2::from_shape_vec((rows.len(), cols), flat).map_err(|e| Error::WallShape {
        width: rows.len(),
        height: cols,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_dimensions() {
        let walls = Walls::default();
        assert_eq!(walls.width(), 8);
        assert_eq!(walls.height(), 8);
        assert!(walls.blocked(Position::new(0, 0), Action::Up));
        assert!(walls.blocked(Position::new(0, 0), Action::Left));
        assert!(!walls.blocked(Position::new(0, 0), Action::Right));
        assert!(walls.blocked(Position::new(0, 0), Action::Down));
    }

    #[test]
    fn open_grid_only_blocks_border() {
        let walls = Walls::open(3, 2).unwrap();
        assert!(walls.blocked(Position::new(0, 0), Action::Up));
        assert!(walls.blocked(Position::new(2, 1), Action::Right));
        assert!(walls.blocked(Position::new(2, 1), Action::Down));
        assert!(!walls.blocked(Position::new(1, 0), Action::Down));
        assert!(!walls.blocked(Position::new(1, 1), Action::Left));
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let horizontal = Array2::from_elem((3, 3), false);
        let vertical = Array2::from_elem((2, 4), false);
        assert!(Walls::new(horizontal.clone(), vertical).is_ok());

        let vertical = Array2::from_elem((2, 3), false);
        assert!(matches!(
            Walls::new(horizontal, vertical),
            Err(Error::WallShape { .. })
        ));

        let ragged: [&[u8]; 2] = [&[1, 0, 1], &[1, 0]];
        assert!(Walls::from_flags(&ragged, &[[1u8, 0, 1]]).is_err());
    }

    #[test]
    fn missing_border_still_blocks() {
        let horizontal = Array2::from_elem((2, 3), false);
        let vertical = Array2::from_elem((2, 3), false);
        let walls = Walls::new(horizontal, vertical).unwrap();
        assert!(walls.blocked(Position::new(0, 0), Action::Up));
        assert!(walls.blocked(Position::new(1, 1), Action::Right));
        assert!(!walls.blocked(Position::new(0, 0), Action::Down));
    }

    #[test]
    fn set_edge_blocks_both_sides() {
        let mut walls = Walls::open(2, 2).unwrap();
        walls.set(Position::new(0, 0), Action::Right, true);
        assert!(walls.blocked(Position::new(0, 0), Action::Right));
        assert!(walls.blocked(Position::new(1, 0), Action::Left));
        walls.set(Position::new(1, 1), Action::Up, true);
        assert!(walls.blocked(Position::new(1, 0), Action::Down));
    }
}
