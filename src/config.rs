//! Application-level configuration loading, including the group color set.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::Category;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RETRO_BOARD_BACK_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    went_well_color: String,
    needs_improvement_color: String,
    neutral_color: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in default colors.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded group colors from config");
                    config
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

    /// Color assigned to a group materialized from responses of the given
    /// category.
    pub fn group_color(&self, category: Category) -> String {
        match category {
            Category::WentWell => self.went_well_color.clone(),
            Category::NeedsImprovement => self.needs_improvement_color.clone(),
        }
    }

    /// Color used for groups created explicitly without one.
    pub fn neutral_group_color(&self) -> String {
        self.neutral_color.clone()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            went_well_color: "#22c55e".into(),
            needs_improvement_color: "#f87171".into(),
            neutral_color: "#94a3b8".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    went_well_color: Option<String>,
    #[serde(default)]
    needs_improvement_color: Option<String>,
    #[serde(default)]
    neutral_color: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            went_well_color: raw.went_well_color.unwrap_or(defaults.went_well_color),
            needs_improvement_color: raw
                .needs_improvement_color
                .unwrap_or(defaults.needs_improvement_color),
            neutral_color: raw.neutral_color.unwrap_or(defaults.neutral_color),
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
