//! Configuration management for the delta-sync engine.
//!
//! Ambient concern carried from the teacher's `core::config`: typed
//! configuration with performance-minded defaults, loadable from a TOML
//! file plus `DSYNC_*` environment variable overrides.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Demo websocket server configuration.
    pub server: ServerConfig,

    /// Dispatcher/store performance tuning.
    pub performance: PerformanceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Demo websocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the demo HTTP + websocket listener.
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections accepted by the demo listener.
    pub max_connections: usize,
}

/// Performance tuning for the store and dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Number of worker threads for the async runtime (0 = auto-detect).
    pub worker_threads: usize,

    /// Maximum number of deltas the dispatcher will coalesce into a single
    /// outbound incremental update before forcing a flush.
    pub max_batch_size: usize,

    /// How long the dispatcher may hold a ready message before a `pull`
    /// arrives, for metrics purposes only (the bridge never drops messages).
    pub batch_timeout: Duration,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Log format (`json` or `pretty`).
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            performance: PerformanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_connections: 10_000,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_batch_size: 1_000,
            batch_timeout: Duration::from_millis(10),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply `DSYNC_*`
    /// environment variable overrides, then validate.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Config::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::config(format!("failed to parse config file: {e}")))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(addr) = env::var("DSYNC_BIND_ADDR") {
            self.server.bind_addr = addr
                .parse()
                .map_err(|e| Error::config(format!("invalid bind address: {e}")))?;
        }
        if let Ok(max_conn) = env::var("DSYNC_MAX_CONNECTIONS") {
            self.server.max_connections = max_conn
                .parse()
                .map_err(|e| Error::config(format!("invalid max connections: {e}")))?;
        }
        if let Ok(workers) = env::var("DSYNC_WORKER_THREADS") {
            self.performance.worker_threads = workers
                .parse()
                .map_err(|e| Error::config(format!("invalid worker threads: {e}")))?;
        }
        if let Ok(level) = env::var("DSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("DSYNC_LOG_FORMAT") {
            self.logging.format = format;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.performance.worker_threads > 1024 {
            return Err(Error::config("too many worker threads (maximum 1024)"));
        }
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("invalid log level")),
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            _ => return Err(Error::config("invalid log format")),
        }
        Ok(())
    }

    /// Resolve the configured worker thread count, auto-detecting from the
    /// number of CPU cores when set to zero.
    pub fn optimal_worker_threads(&self) -> usize {
        if self.performance.worker_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.performance.worker_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn optimal_worker_threads_auto_detects() {
        let mut config = Config::default();
        config.performance.worker_threads = 0;
        assert!(config.optimal_worker_threads() >= 1);
        config.performance.worker_threads = 4;
        assert_eq!(config.optimal_worker_threads(), 4);
    }
}
