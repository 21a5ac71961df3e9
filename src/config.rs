//! Runtime configuration.
//!
//! One JSON file under the platform config dir (`VINYL_CONFIG` overrides the
//! location). Every section is `#[serde(default)]`, so an old or partial file
//! still loads and missing keys take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::monitor::RecoveryPolicy;
use crate::scanner::SortMethod;

const CONFIG_ENV: &str = "VINYL_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browse: BrowseConfig,
    pub list: ListConfig,
    pub scan: ScanConfig,
    pub lyrics: LyricsConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    pub show_hidden: bool,
    pub sort: SortMethod,
}

/// Geometry of windowed list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub item_extent: f64,
    pub overscan: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            item_extent: 40.0,
            overscan: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Longest a single enumeration slice may hold the thread (one 60 Hz frame).
    pub slice_budget_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            slice_budget_ms: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    /// Fraction of the viewport height where the active line is held.
    pub anchor: f64,
    /// Seconds added or removed per offset nudge.
    pub sync_step: f64,
    pub follow_duration_ms: u64,
    /// Lines within this distance of the active one count as "near".
    pub near_window: usize,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            anchor: 0.35,
            sync_step: 0.1,
            follow_duration_ms: 500,
            near_window: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// A one-second sample below this many frames flips to degraded.
    pub degrade_below: u32,
    pub memory_budget_mb: u64,
    pub sample_interval_ms: u64,
    pub recovery: RecoveryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            degrade_below: 45,
            memory_budget_mb: 500,
            sample_interval_ms: 1000,
            recovery: RecoveryPolicy::Sticky,
        }
    }
}

/// Where the config file lives: `$VINYL_CONFIG`, else the platform config dir.
pub fn default_path() -> PathBuf {
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(p);
    }
    if let Some(dirs) = directories::ProjectDirs::from("dev", "vinyl", "vinyl") {
        dirs.config_dir().join("config.json")
    } else {
        PathBuf::from("vinyl.json")
    }
}

impl Config {
    /// Load from the default location. Never fails: a broken file is logged
    /// and replaced by defaults.
    pub fn load() -> Self {
        let path = default_path();
        match Self::load_from(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("config: {}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load from `path`. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("config: {} not found, defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(io_err)
    }
}
