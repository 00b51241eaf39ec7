//! Configuration management for the betround client
//!
//! TOML file, then `BETROUND_*` environment overrides, then validation.

use crate::errors::{BetRoundResult, ConfigurationError};
use crate::games::types::GameType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub timing: TimingConfig,
    pub notifications: NotificationConfig,
    pub stats: StatsConfig,
}

/// Backend endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout, 0 disables it
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub user_id: Option<String>,
    /// Launch URL carrying a `user_id` query parameter
    pub launch_url: Option<String>,
    pub refresh_interval_secs: u64,
}

/// Reveal animation timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TimingConfig {
    /// Settle rounds immediately without waiting out the reveal
    pub skip_reveal: bool,
    /// Per-game reveal overrides in milliseconds, keyed by game name
    pub reveal_delay_ms: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub toast_duration_ms: u64,
    pub haptics: bool,
}

/// Local win/loss tallies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            launch_url: None,
            refresh_interval_secs: 30,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            toast_duration_ms: 3000,
            haptics: true,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./betround_stats.json"),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl SessionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl TimingConfig {
    /// Reveal delay to use for `game`, given the adapter's default
    pub fn reveal_for(&self, game: GameType, default: Duration) -> Duration {
        if self.skip_reveal {
            return Duration::ZERO;
        }
        self.reveal_delay_ms
            .get(game.as_str())
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(default)
    }
}

impl NotificationConfig {
    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from file and process environment
    pub fn load(&self) -> BetRoundResult<ClientConfig> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Load with an explicit environment lookup
    pub fn load_with<F>(&self, lookup: F) -> BetRoundResult<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => ClientConfig::default(),
        };

        apply_env_overrides_from(&mut config, lookup)?;
        validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &Path) -> BetRoundResult<ClientConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    /// Write `config` as TOML
    pub fn save(&self, config: &ClientConfig, path: &Path) -> BetRoundResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path.display(), e)).into())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String, reason: &str) -> Result<T, ConfigurationError> {
    value.parse().map_err(|_| ConfigurationError::InvalidValue {
        field: key.to_string(),
        value,
        reason: reason.to_string(),
    })
}

/// Apply `BETROUND_*` overrides read through `lookup`
pub fn apply_env_overrides_from<F>(config: &mut ClientConfig, lookup: F) -> Result<(), ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("BETROUND_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(timeout) = lookup("BETROUND_REQUEST_TIMEOUT_MS") {
        config.api.request_timeout_ms = parse_env("BETROUND_REQUEST_TIMEOUT_MS", timeout, "Invalid timeout value")?;
    }
    if let Some(user_id) = lookup("BETROUND_USER_ID") {
        config.session.user_id = Some(user_id);
    }
    if let Some(secs) = lookup("BETROUND_REFRESH_INTERVAL_SECS") {
        config.session.refresh_interval_secs =
            parse_env("BETROUND_REFRESH_INTERVAL_SECS", secs, "Invalid interval value")?;
    }
    if let Some(skip) = lookup("BETROUND_SKIP_REVEAL") {
        config.timing.skip_reveal = parse_env("BETROUND_SKIP_REVEAL", skip, "Invalid boolean value")?;
    }
    if let Some(path) = lookup("BETROUND_STATS_PATH") {
        config.stats.path = PathBuf::from(path);
    }
    Ok(())
}

/// Validate configuration values
pub fn validate(config: &ClientConfig) -> Result<(), ConfigurationError> {
    if config.api.base_url.trim().is_empty() {
        return Err(ConfigurationError::MissingRequired("api.base_url".to_string()));
    }

    match url::Url::parse(&config.api.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => {
            return Err(ConfigurationError::InvalidValue {
                field: "api.base_url".to_string(),
                value: config.api.base_url.clone(),
                reason: format!("Unsupported scheme '{}'", url.scheme()),
            })
        }
        Err(e) => {
            return Err(ConfigurationError::InvalidValue {
                field: "api.base_url".to_string(),
                value: config.api.base_url.clone(),
                reason: e.to_string(),
            })
        }
    }

    if config.session.refresh_interval_secs == 0 {
        return Err(ConfigurationError::InvalidValue {
            field: "session.refresh_interval_secs".to_string(),
            value: "0".to_string(),
            reason: "Refresh interval cannot be zero".to_string(),
        });
    }

    if config.notifications.toast_duration_ms == 0 {
        return Err(ConfigurationError::InvalidValue {
            field: "notifications.toast_duration_ms".to_string(),
            value: "0".to_string(),
            reason: "Toast duration cannot be zero".to_string(),
        });
    }

    for key in config.timing.reveal_delay_ms.keys() {
        if key.parse::<GameType>().is_err() {
            return Err(ConfigurationError::InvalidValue {
                field: "timing.reveal_delay_ms".to_string(),
                value: key.clone(),
                reason: "Unknown game".to_string(),
            });
        }
    }

    Ok(())
}
