mod approx;
mod table;

use std::path::{Path, PathBuf};

use crate::{
    error::Result,
    maze::{Action, Position},
    persist,
};

pub use approx::{ActionEncoding, ApproxQ, ApproxV, Approximator, ValueNet, ValueNetConfig};
pub use table::{QTable, ReturnTally, VTable};

/// An action-value estimate, backed either by a table or by a trained approximator
///
/// Every method works before any training has happened; unseen entries read as `0`.
pub trait QFunction {
    /// Estimated value of taking `action` at `pos`
    fn get(&self, pos: Position, action: Action) -> f32;

    /// Record a new value for `(pos, action)`
    ///
    /// Tables write immediately; approximators queue a training example for the next [`fit`](QFunction::fit).
    fn set(&mut self, pos: Position, action: Action, value: f32);

    /// Fold a pass of summed returns into the estimate
    fn average_in(&mut self, tally: &ReturnTally);

    /// Apply queued updates
    fn fit(&mut self, epochs: usize, size_batch: usize);

    /// `true` if [`set`](QFunction::set) only takes effect on the next [`fit`](QFunction::fit)
    fn deferred(&self) -> bool {
        false
    }

    /// Updates queued for the next [`fit`](QFunction::fit)
    fn pending(&self) -> usize {
        0
    }

    /// A dense snapshot of the estimate over the whole grid
    fn table(&self) -> QTable;

    /// Write the estimate to its backing store, if it has one
    fn persist(&self) -> Result<()>;
}

/// A state-value estimate, the counterpart of [`QFunction`] for planning agents
pub trait VFunction {
    fn get(&self, pos: Position) -> f32;

    fn set(&mut self, pos: Position, value: f32);

    fn fit(&mut self, epochs: usize, size_batch: usize);

    fn deferred(&self) -> bool {
        false
    }

    fn pending(&self) -> usize {
        0
    }

    fn table(&self) -> VTable;

    fn persist(&self) -> Result<()>;
}

/// A [`QTable`] kept in memory and optionally mirrored to a file
#[derive(Debug, Clone)]
pub struct TabularQ {
    table: QTable,
    path: Option<PathBuf>,
}

impl TabularQ {
    /// Load the table at `path`, or start from zeros if there is none or it does not fit the grid
    pub fn new(width: usize, height: usize, path: Option<PathBuf>) -> Self {
        let table = persist::load_or_else(
            path.as_deref(),
            |t: &QTable| t.check_shape(width, height),
            || QTable::zeros(width, height),
        );
        Self { table, path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl QFunction for TabularQ {
    fn get(&self, pos: Position, action: Action) -> f32 {
        self.table.get(pos, action)
    }

    fn set(&mut self, pos: Position, action: Action, value: f32) {
        self.table.set(pos, action, value);
    }

    fn average_in(&mut self, tally: &ReturnTally) {
        self.table.average_in(tally);
    }

    fn fit(&mut self, _epochs: usize, _size_batch: usize) {}

    fn table(&self) -> QTable {
        self.table.clone()
    }

    fn persist(&self) -> Result<()> {
        match &self.path {
            Some(path) => persist::save(path, &self.table),
            None => Ok(()),
        }
    }
}

/// A [`VTable`] kept in memory and optionally mirrored to a file
#[derive(Debug, Clone)]
pub struct TabularV {
    table: VTable,
    path: Option<PathBuf>,
}

impl TabularV {
    pub fn new(width: usize, height: usize, path: Option<PathBuf>) -> Self {
        let table = persist::load_or_else(
            path.as_deref(),
            |t: &VTable| t.check_shape(width, height),
            || VTable::zeros(width, height),
        );
        Self { table, path }
    }
}

impl VFunction for TabularV {
    fn get(&self, pos: Position) -> f32 {
        self.table.get(pos)
    }

    fn set(&mut self, pos: Position, value: f32) {
        self.table.set(pos, value);
    }

    fn fit(&mut self, _epochs: usize, _size_batch: usize) {}

    fn table(&self) -> VTable {
        self.table.clone()
    }

    fn persist(&self) -> Result<()> {
        match &self.path {
            Some(path) => persist::save(path, &self.table),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabular_q_round_trip_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.bin");

        let mut q = TabularQ::new(3, 3, Some(path.clone()));
        q.set(Position::new(1, 2), Action::Left, 0.1 + 0.2);
        q.set(Position::new(0, 0), Action::Up, -1.0 / 3.0);
        let mut tally = ReturnTally::new(3, 3);
        tally.add(Position::new(2, 2), Action::Down, 7.0);
        q.average_in(&tally);
        q.persist().unwrap();

        let reloaded = TabularQ::new(3, 3, Some(path));
        assert_eq!(reloaded.table(), q.table());
        let bits = |t: &QTable| t.values().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&reloaded.table()), bits(&q.table()));
    }

    #[test]
    fn tabular_q_falls_back_on_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.bin");
        let mut q = TabularQ::new(2, 2, Some(path.clone()));
        q.set(Position::new(1, 1), Action::Up, 5.0);
        q.persist().unwrap();

        let other = TabularQ::new(4, 4, Some(path));
        assert_eq!(other.table(), QTable::zeros(4, 4));
    }

    #[test]
    fn tabular_v_survives_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = TabularV::new(2, 2, Some(dir.path().join("missing/v.bin")));
        assert_eq!(v.get(Position::new(1, 1)), 0.0);
        v.set(Position::new(1, 1), 2.5);
        v.persist().unwrap();
        let reloaded = TabularV::new(2, 2, Some(dir.path().join("missing/v.bin")));
        assert_eq!(reloaded.get(Position::new(1, 1)), 2.5);
    }

    #[test]
    fn in_memory_store_never_touches_disk() {
        let mut q = TabularQ::new(2, 2, None);
        q.set(Position::new(0, 1), Action::Right, 1.0);
        assert!(q.persist().is_ok());
        assert!(q.path().is_none());
        assert!(!q.deferred());
    }
}
