//! Error types for the maze laboratory

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to {operation} '{}': {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("model record error: {0}")]
    Record(String),

    #[error("wall matrices do not describe a {width}x{height} grid: {reason}")]
    WallShape {
        width: usize,
        height: usize,
        reason: String,
    },

    #[error("table shape {actual:?} does not match expected shape {expected:?}")]
    TableShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("invalid decay schedule: {0}")]
    InvalidSchedule(&'static str),

    #[error("unknown agent kind '{input}'. Expected one of: {expected}")]
    UnknownAgentKind { input: String, expected: String },
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<burn::record::RecorderError> for Error {
    fn from(err: burn::record::RecorderError) -> Self {
        Error::Record(format!("{err:?}"))
    }
}
