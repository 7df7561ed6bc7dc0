//! Table persistence
//!
//! Tables are stored with bincode so a save followed by a load reproduces every value bit for bit.

use std::{fs, path::Path};

use log::info;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Encode `value` into the file at `path`, creating parent directories as needed
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            operation: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let bytes = bincode::serialize(value)?;
    fs::write(path, bytes).map_err(|source| Error::Io {
        operation: "write",
        path: path.to_path_buf(),
        source,
    })
}

/// Decode a value previously written by [`save`]
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|source| Error::Io {
        operation: "read",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Load from `path` if there is one and the decoded value passes `check`, otherwise build a fresh value
///
/// Failures are logged and never reach the caller.
pub fn load_or_else<T, C, F>(path: Option<&Path>, check: C, fallback: F) -> T
where
    T: DeserializeOwned,
    C: FnOnce(&T) -> Result<()>,
    F: FnOnce() -> T,
{
    let Some(path) = path else {
        return fallback();
    };
    match load(path).and_then(|value| check(&value).map(|_| value)) {
        Ok(value) => {
            info!("loaded {}", path.display());
            value
        }
        Err(err) => {
            info!("starting from scratch, could not load {}: {err}", path.display());
            fallback()
        }
    }
}
