//! JSON file persistence shared by the blacklists and the suggestion state.
//!
//! Every store file is a UTF-8, pretty-printed JSON document that is read
//! once at construction and rewritten in full after each mutation. Loading
//! reports corruption as an explicit error so callers decide whether to
//! abort or substitute an empty store.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Failure while reading or writing a persisted store file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Reads a store file. A missing file is `Ok(None)`; unreadable or corrupt
/// content is an error.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Rewrites a store file in full, creating the data directory on demand.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}
