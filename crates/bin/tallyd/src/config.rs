//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `tally.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Schedule service settings.
    pub schedules: SchedulesConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Periodic schedule service configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulesConfig {
    /// Seconds between two advance runs.
    pub run_interval_secs: u64,
    /// Days ahead an occurrence counts as upcoming.
    pub upcoming_days: u32,
}

impl Config {
    /// Load configuration from `tally.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("tally.toml")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("TALLY_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("TALLY_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(secs) = var("TALLY_RUN_INTERVAL_SECS").and_then(|val| val.parse().ok()) {
            self.schedules.run_interval_secs = secs;
        }
        if let Some(days) = var("TALLY_UPCOMING_DAYS").and_then(|val| val.parse().ok()) {
            self.schedules.upcoming_days = days;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schedules.run_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "run_interval_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Delay between two advance runs.
    #[must_use]
    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.schedules.run_interval_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:tally.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "tallyd=info,tally_app=info".to_string(),
        }
    }
}

impl Default for SchedulesConfig {
    fn default() -> Self {
        Self {
            run_interval_secs: 3600,
            upcoming_days: tally_domain::status::DEFAULT_UPCOMING_DAYS,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite:tally.db?mode=rwc");
        assert_eq!(config.schedules.run_interval_secs, 3600);
        assert_eq!(config.schedules.upcoming_days, 7);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.schedules.run_interval_secs, 3600);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [schedules]
            run_interval_secs = 60
            upcoming_days = 14
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.schedules.run_interval_secs, 60);
        assert_eq!(config.schedules.upcoming_days, 14);
        assert_eq!(config.run_interval(), Duration::from_secs(60));
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [schedules]
            upcoming_days = 3
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.schedules.upcoming_days, 3);
        assert_eq!(config.schedules.run_interval_secs, 3600);
        assert_eq!(config.database_url(), "sqlite:tally.db?mode=rwc");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.schedules.upcoming_days, 7);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("TALLY_DATABASE_URL", "sqlite::memory:"),
            ("TALLY_LOG", "warn"),
            ("TALLY_RUN_INTERVAL_SECS", "30"),
            ("TALLY_UPCOMING_DAYS", "10"),
        ]));
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.logging.filter, "warn");
        assert_eq!(config.schedules.run_interval_secs, 30);
        assert_eq!(config.schedules.upcoming_days, 10);
    }

    #[test]
    fn should_prefer_rust_log_over_tally_log() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("TALLY_LOG", "warn"), ("RUST_LOG", "trace")]));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_ignore_unparsable_numeric_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("TALLY_RUN_INTERVAL_SECS", "soon")]));
        assert_eq!(config.schedules.run_interval_secs, 3600);
    }

    #[test]
    fn should_reject_zero_interval() {
        let mut config = Config::default();
        config.schedules.run_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_accept_default_interval() {
        assert!(Config::default().validate().is_ok());
    }
}
