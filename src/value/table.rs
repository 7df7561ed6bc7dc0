use ndarray::{Array2, Array3, Zip};
use serde::{Deserialize, Serialize};
use strum::VariantArray;

use crate::{
    error::{Error, Result},
    maze::{Action, Position},
};

/// Dense action values shaped `[W, H, 4]` with a parallel visit count per entry
///
/// Counts start at one and hold the number of absorbed returns plus one, so every
/// entry stays at least one and a zero-initialized value carries no weight in the
/// first average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: Array3<f32>,
    counts: Array3<f32>,
}

impl QTable {
    pub fn zeros(width: usize, height: usize) -> Self {
        let shape = (width, height, Action::COUNT);
        Self {
            values: Array3::zeros(shape),
            counts: Array3::ones(shape),
        }
    }

    /// Grid size as `(width, height)`
    pub fn size(&self) -> (usize, usize) {
        let (w, h, _) = self.values.dim();
        (w, h)
    }

    /// The value of `action` at `pos`, `0` outside the grid
    pub fn get(&self, pos: Position, action: Action) -> f32 {
        self.values
            .get([pos.x, pos.y, action.index()])
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, pos: Position, action: Action, value: f32) {
        if let Some(v) = self.values.get_mut([pos.x, pos.y, action.index()]) {
            *v = value;
        }
    }

    pub fn count(&self, pos: Position, action: Action) -> f32 {
        self.counts
            .get([pos.x, pos.y, action.index()])
            .copied()
            .unwrap_or(1.0)
    }

    /// The best action value at `pos`
    pub fn max(&self, pos: Position) -> f32 {
        Action::VARIANTS
            .iter()
            .map(|&a| self.get(pos, a))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn values(&self) -> &Array3<f32> {
        &self.values
    }

    /// Fold a pass of returns into the running averages
    ///
    /// For every visited entry, `value ← (value·n + sum) / (n + visits)` where `n` is the
    /// number of returns absorbed so far. Unvisited entries are untouched.
    pub fn average_in(&mut self, tally: &ReturnTally) {
        Zip::from(&mut self.values)
            .and(&mut self.counts)
            .and(&tally.sums)
            .and(&tally.visits)
            .for_each(|value, count, &sum, &visits| {
                if visits > 0.0 {
                    let absorbed = *count - 1.0;
                    *value = (*value * absorbed + sum) / (absorbed + visits);
                    *count += visits;
                }
            });
    }

    /// Verify the table describes a `width x height` grid and its counts are valid
    pub fn check_shape(&self, width: usize, height: usize) -> Result<()> {
        let expected = vec![width, height, Action::COUNT];
        for shape in [self.values.shape(), self.counts.shape()] {
            if shape != expected.as_slice() {
                return Err(Error::TableShape {
                    expected,
                    actual: shape.to_vec(),
                });
            }
        }
        if self.counts.iter().any(|&c| c.is_nan() || c < 1.0) {
            return Err(Error::TableShape {
                expected,
                actual: self.counts.shape().to_vec(),
            });
        }
        Ok(())
    }
}

/// Returns gathered over one pass of episodes, summed per `(position, action)`
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTally {
    sums: Array3<f32>,
    visits: Array3<f32>,
}

impl ReturnTally {
    pub fn new(width: usize, height: usize) -> Self {
        let shape = (width, height, Action::COUNT);
        Self {
            sums: Array3::zeros(shape),
            visits: Array3::zeros(shape),
        }
    }

    pub fn add(&mut self, pos: Position, action: Action, ret: f32) {
        let index = [pos.x, pos.y, action.index()];
        if let (Some(sum), Some(visits)) = (self.sums.get_mut(index), self.visits.get_mut(index)) {
            *sum += ret;
            *visits += 1.0;
        }
    }

    pub fn visits(&self, pos: Position, action: Action) -> f32 {
        self.visits
            .get([pos.x, pos.y, action.index()])
            .copied()
            .unwrap_or_default()
    }

    /// Mean return of each visited entry
    pub fn means(&self) -> impl Iterator<Item = (Position, Action, f32)> + '_ {
        self.visits
            .indexed_iter()
            .filter(|(_, n)| **n > 0.0)
            .filter_map(|((x, y, a), &n)| {
                let action = Action::from_index(a)?;
                Some((Position::new(x, y), action, self.sums[[x, y, a]] / n))
            })
    }
}

/// Dense state values shaped `[W, H]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VTable {
    values: Array2<f32>,
}

impl VTable {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            values: Array2::zeros((width, height)),
        }
    }

    pub fn size(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// The value of `pos`, `0` outside the grid
    pub fn get(&self, pos: Position) -> f32 {
        self.values
            .get([pos.x, pos.y])
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, pos: Position, value: f32) {
        if let Some(v) = self.values.get_mut([pos.x, pos.y]) {
            *v = value;
        }
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn check_shape(&self, width: usize, height: usize) -> Result<()> {
        if self.values.dim() != (width, height) {
            return Err(Error::TableShape {
                expected: vec![width, height],
                actual: self.values.shape().to_vec(),
            });
        }
        Ok(())
    }
}
