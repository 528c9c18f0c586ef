//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use plog_core::{CalorieModel, TrackerConfig, WatchOptions};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Energy estimate per minute of running time.
    pub calories_per_minute: f64,
    /// Desired time between location fixes.
    pub watch_interval_ms: u64,
    /// Desired minimum movement between location fixes.
    pub watch_min_distance_m: f64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let watch = WatchOptions::default();
        Self {
            database_path: data_dir.join("plog.db"),
            calories_per_minute: CalorieModel::default().calories_per_minute,
            watch_interval_ms: watch.interval_hint_ms,
            watch_min_distance_m: watch.min_distance_hint_m,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // PLOG_DATABASE_PATH, PLOG_CALORIES_PER_MINUTE, ...
        figment = figment.merge(Env::prefixed("PLOG_"));

        figment.extract()
    }

    /// Tracker tunables derived from this configuration.
    pub const fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            calories: CalorieModel {
                calories_per_minute: self.calories_per_minute,
            },
            watch: WatchOptions {
                interval_hint_ms: self.watch_interval_ms,
                min_distance_hint_m: self.watch_min_distance_m,
            },
        }
    }
}

/// Returns the platform-specific config directory for plog.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("plog"))
}

/// Returns the platform-specific data directory for plog.
///
/// On Linux: `~/.local/share/plog`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("plog"))
}
