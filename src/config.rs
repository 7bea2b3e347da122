//! Configuration management for mpctl.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keepalive::KeepAliveConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Enable multipath routing at startup.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Interface poll interval.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Name prefixes that mark an interface as a secondary transport.
    #[serde(default = "default_secondary_prefixes")]
    pub secondary_prefixes: Vec<String>,

    /// Cycle active links once at startup so established connections pick
    /// up the new policy routes.
    #[serde(default)]
    pub bounce_on_start: bool,

    /// Interface name fragments excluded from the startup cycle.
    #[serde(default = "default_bounce_skip")]
    pub bounce_skip: Vec<String>,

    /// Keep-alive configuration.
    #[serde(default)]
    pub keepalive: KeepAliveConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_enabled() -> bool {
    true
}
fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}
fn default_secondary_prefixes() -> Vec<String> {
    vec!["rmnet".into(), "wwan".into()]
}
fn default_bounce_skip() -> Vec<String> {
    vec!["wlan0".into()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval: default_poll_interval(),
            secondary_prefixes: default_secondary_prefixes(),
            bounce_on_start: false,
            bounce_skip: default_bounce_skip(),
            keepalive: KeepAliveConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig("poll_interval must be non-zero".into()));
        }

        if self.keepalive.period.is_zero() {
            return Err(Error::InvalidConfig(
                "keepalive.period must be non-zero".into(),
            ));
        }

        if self.keepalive.connect_attempts == 0 {
            return Err(Error::InvalidConfig(
                "keepalive.connect_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "mpctl", "mpctl").map_or_else(
            || PathBuf::from("mpctl.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log file path.
    pub file: Option<PathBuf>,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.enabled);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.secondary_prefixes, ["rmnet", "wwan"]);
        assert!(!config.bounce_on_start);
        assert_eq!(config.keepalive.period, Duration::from_millis(5000));
    }

    #[test]
    fn durations_parse_as_humantime() {
        let config: Config = toml::from_str(
            r#"
            poll_interval = "500ms"

            [keepalive]
            period = "10s"
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.keepalive.period, Duration::from_secs(10));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = Config {
            poll_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_connect_attempts_is_rejected() {
        let mut config = Config::default();
        config.keepalive.connect_attempts = 0;
        assert!(config.validate().is_err());
    }
}
