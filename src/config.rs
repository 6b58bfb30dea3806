//! Application-level configuration loading, including the first-run countdown defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::dao::models::NewCountdownSettings;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COUNTDOWN_BACK_CONFIG_PATH";

const DEFAULT_TITLE: &str = "LES RÉSULTATS SERONT DISPONIBLES DANS";
const DEFAULT_DESCRIPTION: &str =
    "Les résultats exceptionnels de nos membres d'élite seront bientôt révélés.";
const DEFAULT_BOOTSTRAP_HOURS: u32 = 24;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Attribution recorded on rows created by the first-run bootstrap.
pub const BOOTSTRAP_AUTHOR: &str = "bootstrap";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub bootstrap: BootstrapDefaults,
    /// Upper bound on every store round-trip.
    pub request_timeout: Duration,
    /// How often the hosted store is polled for changes made elsewhere.
    pub change_poll_interval: Duration,
}

/// Row synthesised when the store holds no countdown yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapDefaults {
    pub title: String,
    pub description: Option<String>,
    pub hours: u32,
}

impl BootstrapDefaults {
    /// Insert payload targeting `now + hours`.
    pub fn new_settings(&self, now: OffsetDateTime) -> NewCountdownSettings {
        NewCountdownSettings {
            target_date: now + time::Duration::hours(i64::from(self.hours)),
            is_active: true,
            title: self.title.clone(),
            description: self.description.clone(),
            created_by: Some(BOOTSTRAP_AUTHOR.to_string()),
        }
    }
}

impl Default for BootstrapDefaults {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            description: Some(DEFAULT_DESCRIPTION.to_string()),
            hours: DEFAULT_BOOTSTRAP_HOURS,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        bootstrap_hours = app_config.bootstrap.hours,
                        "loaded countdown config"
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

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bootstrap: BootstrapDefaults::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            change_poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    bootstrap_title: Option<String>,
    /// `null` explicitly disables the default description.
    #[serde(default, with = "::serde_with::rust::double_option")]
    bootstrap_description: Option<Option<String>>,
    #[serde(default)]
    bootstrap_hours: Option<u32>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    change_poll_interval_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let bootstrap = BootstrapDefaults {
            title: value
                .bootstrap_title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or(defaults.bootstrap.title),
            description: value
                .bootstrap_description
                .unwrap_or(defaults.bootstrap.description),
            hours: value
                .bootstrap_hours
                .filter(|hours| *hours > 0)
                .unwrap_or(defaults.bootstrap.hours),
        };

        Self {
            bootstrap,
            request_timeout: value
                .request_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            change_poll_interval: value
                .change_poll_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.change_poll_interval),
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
