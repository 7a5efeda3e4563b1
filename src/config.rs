//! Application-level configuration loading: table timings, channel sizes and cache paths.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::round_lifecycle::LifecycleDelays;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "OLD_HECK_BACK_CONFIG_PATH";
const DEFAULT_SHARE_CACHE_PATH: &str = "data/shares.json";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Quiet period before typed regular bids are pushed.
    pub bid_advance_delay: Duration,
    /// Wait after the last result before the round seals itself.
    pub auto_complete_delay: Duration,
    /// Pause between sealing a round and dealing the next one.
    pub next_round_delay: Duration,
    /// Wait before a viewer that did not seal a round deals the next one.
    pub recovery_delay: Duration,
    /// Snapshots buffered per watcher before it is considered lagging.
    pub watch_capacity: usize,
    /// JSON file holding share codes.
    pub share_cache_path: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        bid_advance_ms = app_config.bid_advance_delay.as_millis() as u64,
                        auto_complete_ms = app_config.auto_complete_delay.as_millis() as u64,
                        next_round_ms = app_config.next_round_delay.as_millis() as u64,
                        "loaded table timings from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Delays handed to each round lifecycle controller.
    pub fn lifecycle_delays(&self) -> LifecycleDelays {
        LifecycleDelays {
            auto_complete: self.auto_complete_delay,
            next_round: self.next_round_delay,
            recovery: self.recovery_delay,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    bid_advance_ms: u64,
    auto_complete_ms: u64,
    next_round_ms: u64,
    recovery_ms: u64,
    watch_capacity: usize,
    share_cache_path: PathBuf,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            bid_advance_ms: 2000,
            auto_complete_ms: 1500,
            next_round_ms: 500,
            recovery_ms: 2000,
            watch_capacity: 32,
            share_cache_path: PathBuf::from(DEFAULT_SHARE_CACHE_PATH),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            bid_advance_delay: Duration::from_millis(value.bid_advance_ms),
            auto_complete_delay: Duration::from_millis(value.auto_complete_ms),
            next_round_delay: Duration::from_millis(value.next_round_ms),
            recovery_delay: Duration::from_millis(value.recovery_ms),
            watch_capacity: value.watch_capacity.max(1),
            share_cache_path: value.share_cache_path,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
