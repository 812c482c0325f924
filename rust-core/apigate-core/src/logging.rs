//! # Logging
//!
//! `tracing-subscriber` setup for binaries. `RUST_LOG`, when set, takes
//! precedence over the configured level.

use crate::error::{Error, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive (e.g. "info", "apigate_core=debug,hyper=warn")
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl LogConfig {
    /// Build the filter for this config
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `level` is not a valid filter directive
    pub fn env_filter(&self) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => self.level_filter(),
        }
    }

    /// Filter from `level` alone, ignoring `RUST_LOG`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `level` is not a valid filter directive
    pub fn level_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.level)
            .map_err(|e| Error::config(format!("invalid log level `{}`: {e}", self.level)))
    }
}

/// Install the global subscriber
///
/// Returns `false` if a subscriber was already installed, which is not an
/// error.
///
/// # Errors
///
/// Returns `Error::Config` if the level is invalid
pub fn init_logging(config: &LogConfig) -> Result<bool> {
    let filter = config.env_filter()?;
    let installed = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok()
    };
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.json);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let config = LogConfig {
            level: "apigate=verbose".to_string(),
            json: false,
        };
        let err = config.level_filter().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("apigate=verbose"));

        let config = LogConfig {
            level: "apigate_core=debug,hyper=warn".to_string(),
            json: false,
        };
        tokio_test::assert_ok!(config.level_filter());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig {
            level: "warn".to_string(),
            json: false,
        };
        let _ = init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LogConfig = serde_json::from_str(r#"{"json": false}"#).unwrap();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }
}
