//! Queue configuration.
//!
//! Loads a TOML file into a strongly-typed [`QueueConfig`] using `serde` +
//! `toml`. All fields have defaults, so an empty file (or no file at all) is
//! valid.
//!
//! # Example `hopper.toml`
//! ```toml
//! [queue]
//! sync_writes    = false
//! max_chunk_size = 524_288   # 512 KiB
//! ```

use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::QueueError;

const DEFAULT_MAX_CHUNK_SIZE: usize = 512 * 1024;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueueConfig {
    /// Fsync journal writes before acknowledging them. Off by default; the
    /// journal's own write path still survives process crashes, at the cost
    /// of the most recent writes on power loss.
    pub sync_writes: bool,
    /// Largest chunk record accepted by a single write.
    pub max_chunk_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            sync_writes: false,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    queue: QueueConfig,
}

/// Load configuration from a TOML file into `QueueConfig`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<QueueConfig, QueueError> {
    let raw = fs::read_to_string(&path)?;
    let file: ConfigFile =
        toml::from_str(&raw).map_err(|e| QueueError::InvalidConfig(e.to_string()))?;
    Ok(file.queue)
}
