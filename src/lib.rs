/// Agents and the contract the control loop drives them through
pub mod agent;

/// The episode loop
pub mod control;

/// Exploration rate schedules
pub mod decay;

/// Environment
pub mod env;

/// Crate error type
pub mod error;

/// Recorded steps and episodes
pub mod experience;

/// Exploration policies
pub mod exploration;

/// The maze environment
pub mod maze;

/// Table storage
pub mod persist;

/// Value estimates, tabular and approximated
pub mod value;

mod util;

pub use error::{Error, Result};
