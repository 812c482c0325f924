//! # Configuration
//!
//! Gateway settings loaded from defaults, an optional JSON file and
//! `APIGATE__SECTION__KEY` environment overrides, applied in that order.
//!
//! ```text
//! APIGATE__SERVER__ADDRESS=0.0.0.0:8080
//! APIGATE__DISPATCH__TIMEOUT_MS=5000
//! APIGATE__DISPATCH__QUEUE_LIMIT=none
//! APIGATE__LOG__JSON=false
//! ```

use crate::dispatcher::DispatchConfig;
use crate::error::{Error, Result};
use crate::logging::LogConfig;
use crate::server::ServerConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "APIGATE";

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Bind address
    pub address: SocketAddr,
    /// Drain timeout on shutdown, in seconds
    pub shutdown_timeout_secs: u64,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            address: server.address,
            shutdown_timeout_secs: server.shutdown_timeout.as_secs(),
            max_body_size: server.max_body_size,
        }
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchSettings {
    /// In-flight invocations allowed per handler
    pub max_concurrent: usize,
    /// Per-request deadline in milliseconds
    pub timeout_ms: u64,
    /// Extra attempts after a transient failure
    pub retry_attempts: u32,
    /// Waiters allowed per handler before failing fast; `None` is unbounded
    pub queue_limit: Option<usize>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            timeout_ms: 30_000,
            retry_attempts: 0,
            queue_limit: None,
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP listener
    pub server: ServerSettings,
    /// Dispatcher limits
    pub dispatch: DispatchSettings,
    /// Logging
    pub log: LogConfig,
}

impl GatewayConfig {
    /// Parse a JSON document
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the document does not describe a config
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::config(format!("invalid config: {e}")))
    }

    /// Read and parse a JSON file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Load from an optional file, then the process environment
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unreadable file or a bad override
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `APIGATE__SECTION__KEY` overrides; other variables are ignored
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the variable if a value does not parse
    /// or the key is unknown
    pub fn apply_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        let prefix = format!("{ENV_PREFIX}__");
        let overrides: HashMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .collect();

        for (key, value) in &overrides {
            self.apply_env_var(&key[prefix.len()..], key, value)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, suffix: &str, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = suffix.split("__").collect();

        match parts.as_slice() {
            ["SERVER", "ADDRESS"] => self.server.address = parse(key, value, "socket address")?,
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.server.shutdown_timeout_secs = parse(key, value, "integer")?;
            }
            ["SERVER", "MAX_BODY_SIZE"] => {
                self.server.max_body_size = parse(key, value, "integer")?;
            }

            ["DISPATCH", "MAX_CONCURRENT"] => {
                self.dispatch.max_concurrent = parse(key, value, "integer")?;
            }
            ["DISPATCH", "TIMEOUT_MS"] => self.dispatch.timeout_ms = parse(key, value, "integer")?,
            ["DISPATCH", "RETRY_ATTEMPTS"] => {
                self.dispatch.retry_attempts = parse(key, value, "integer")?;
            }
            ["DISPATCH", "QUEUE_LIMIT"] => {
                self.dispatch.queue_limit = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(parse(key, value, "integer or 'none'")?)
                };
            }

            ["LOG", "LEVEL"] => self.log.level = value.to_string(),
            ["LOG", "JSON"] => {
                self.log.json = parse_bool(value)
                    .ok_or_else(|| env_error(key, "expected boolean"))?;
            }

            _ => return Err(env_error(key, "unknown key")),
        }
        Ok(())
    }

    /// Check values that serde cannot
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a zero limit or timeout
    pub fn validate(&self) -> Result<()> {
        if self.server.max_body_size == 0 {
            return Err(Error::config("server.max_body_size must be greater than 0"));
        }
        self.dispatch_config().validate()
    }

    /// Listener config for [`crate::server::Server`]
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            address: self.server.address,
            shutdown_timeout: Duration::from_secs(self.server.shutdown_timeout_secs),
            max_body_size: self.server.max_body_size,
        }
    }

    /// Dispatcher limits
    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        let config = DispatchConfig::new(
            self.dispatch.max_concurrent,
            Duration::from_millis(self.dispatch.timeout_ms),
        )
        .with_retry_attempts(self.dispatch.retry_attempts);

        match self.dispatch.queue_limit {
            Some(limit) => config.with_queue_limit(limit),
            None => config,
        }
    }
}

fn env_error(key: &str, reason: &str) -> Error {
    Error::config(format!("{key}: {reason}"))
}

fn parse<T: std::str::FromStr>(key: &str, value: &str, expected: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| env_error(key, &format!("expected {expected}")))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
