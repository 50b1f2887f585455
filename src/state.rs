//! Core player state types and persisted configuration.
//!
//! Provides the enumerated state machine types ([`PlayerState`],
//! [`RepeatMode`]) and the [`Config`]/[`ConfigStore`] pair that stands in for
//! the original's single persisted configuration key, `player:volume`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, PlaybackResult};

/// The key under which the current volume is persisted.
pub const VOLUME_CONFIG_KEY: &str = "player:volume";

/// Playback state. Process-wide; transitions only on the player thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Stopped,
    Paused,
    Playing,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Repeat behavior requested by the user.
///
/// See §4.B "Next(force)" for how this interacts with queue length and the
/// `force` flag to produce an *effective* repeat mode at any given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    Off,
    Song,
    All,
}

impl Default for RepeatMode {
    fn default() -> Self {
        Self::Off
    }
}

/// Sort key accepted by `queue_make` when enumerating a query's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Album,
    None,
}

/// Process configuration for the demo binary / embedder.
///
/// Mirrors the teacher's `ServerConfig`: a `Default` plus a YAML-file loader
/// with CLI/env overrides applied by the caller (see `src/bin/playerd.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level for the demo binary (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: String,
    /// Directory for persisted state (the volume KV file).
    pub data_dir: Option<PathBuf>,
    /// Capacity of the status-event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: None,
            event_channel_capacity: 100,
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file, falling back to defaults for any
    /// field the file omits. Returns defaults outright if `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

/// Persisted key/value store abstraction, standing in for the original's
/// `db_config_fetch_int`/`db_config_save_int` configuration KV dependency.
///
/// Only integer values are needed (the sole persisted key is the volume),
/// so the trait is kept minimal rather than a general document store.
pub trait ConfigStore: Send + Sync {
    /// Fetches a persisted integer value, if present.
    fn get_int(&self, key: &str) -> PlaybackResult<Option<i64>>;

    /// Persists an integer value under `key`.
    fn save_int(&self, key: &str, value: i64) -> PlaybackResult<()>;
}

/// In-memory `ConfigStore`, used by tests and as the default when no data
/// directory is configured.
#[derive(Default)]
pub struct InMemoryConfigStore {
    values: Mutex<HashMap<String, i64>>,
}

impl ConfigStore for InMemoryConfigStore {
    fn get_int(&self, key: &str) -> PlaybackResult<Option<i64>> {
        Ok(self.values.lock().get(key).copied())
    }

    fn save_int(&self, key: &str, value: i64) -> PlaybackResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON-file-backed `ConfigStore`.
///
/// Reads and rewrites the whole file on every access; acceptable because the
/// engine persists at most a handful of keys at a very low write rate
/// (volume changes, not per-tick state).
pub struct JsonFileConfigStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, i64>>,
}

impl JsonFileConfigStore {
    /// Opens (or lazily creates) a JSON-backed store at `path`.
    pub fn open(path: PathBuf) -> PlaybackResult<Self> {
        let cache = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| PlaybackError::ConfigStore(e.to_string()))?;
            serde_json::from_str(&text).map_err(|e| PlaybackError::ConfigStore(e.to_string()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    fn flush(&self, cache: &HashMap<String, i64>) -> PlaybackResult<()> {
        let text =
            serde_json::to_string_pretty(cache).map_err(|e| PlaybackError::ConfigStore(e.to_string()))?;
        std::fs::write(&self.path, text).map_err(|e| PlaybackError::ConfigStore(e.to_string()))
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn get_int(&self, key: &str) -> PlaybackResult<Option<i64>> {
        Ok(self.cache.lock().get(key).copied())
    }

    fn save_int(&self, key: &str, value: i64) -> PlaybackResult<()> {
        let mut cache = self.cache.lock();
        cache.insert(key.to_string(), value);
        self.flush(&cache)
    }
}
