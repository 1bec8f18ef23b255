//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;
use crate::onboarding::model::settings_keys;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path of the libSQL database holding the snapshot.
    pub db_path: PathBuf,
    /// Owner of the snapshot row (single-user system).
    pub user_id: String,
    /// Key of the durable slot the snapshot is written under.
    pub storage_key: String,
    /// Interval between auto-save ticks.
    pub autosave_interval: Duration,
    /// Activity gaps longer than this are not counted toward time spent.
    pub idle_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/onboarding.db"),
            user_id: settings_keys::DEFAULT_USER.to_string(),
            storage_key: settings_keys::ONBOARDING_STATE.to_string(),
            autosave_interval: Duration::from_secs(30),
            idle_threshold: Duration::from_secs(30 * 60), // 30 minutes
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Unparseable numbers are logged and fall back to the default; a zero
    /// auto-save interval is rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = std::env::var("ONBOARDING_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let user_id = std::env::var("ONBOARDING_USER_ID").unwrap_or(defaults.user_id);

        let storage_key = std::env::var("ONBOARDING_STORAGE_KEY").unwrap_or(defaults.storage_key);

        let autosave_interval = parse_or(
            "ONBOARDING_AUTOSAVE_SECS",
            std::env::var("ONBOARDING_AUTOSAVE_SECS").ok(),
            defaults.autosave_interval.as_secs(),
        );

        let idle_minutes = parse_or(
            "ONBOARDING_IDLE_MINUTES",
            std::env::var("ONBOARDING_IDLE_MINUTES").ok(),
            defaults.idle_threshold.as_secs() / 60,
        );

        let config = Self {
            db_path,
            user_id,
            storage_key,
            autosave_interval: Duration::from_secs(autosave_interval),
            idle_threshold: Duration::from_secs(idle_minutes.saturating_mul(60)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "ONBOARDING_AUTOSAVE_SECS".to_string(),
                message: "auto-save interval must be greater than zero".to_string(),
            });
        }
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ONBOARDING_STORAGE_KEY".to_string(),
                message: "storage key must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse an optional raw env value, warning and falling back on garbage.
fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "Ignoring invalid config value, using default");
            default
        }
    }
}
