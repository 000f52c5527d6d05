//! Configuration for the DharaIO capture daemon
//!
//! Loads configuration from a TOML file. Every field has a default so a
//! missing file or a partial file still yields a usable configuration.

use crate::decoder::Generation;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// TCP bind address for inbound device connections
    ///
    /// Examples:
    /// - `0.0.0.0:18888` - Bind to all interfaces on port 18888
    /// - `127.0.0.1:18888` - Localhost only
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Accept-loop poll timeout in milliseconds
    ///
    /// Must stay sub-second so the stop signal is observed promptly.
    #[serde(default = "default_accept_timeout_ms")]
    pub accept_timeout_ms: u64,
}

/// Capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Base directory for recorded sessions
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Number of ingestion shards (worker threads)
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    /// Per-read receive buffer size in bytes
    #[serde(default = "default_tcp_buffer_size")]
    pub tcp_buffer_size: usize,

    /// Shard readiness poll timeout in milliseconds (sub-second)
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Sleep interval when a shard has no registered connections
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,

    /// Capacity of each shard's inbound connection queue
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Grace period for shard teardown on shutdown, in milliseconds
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

/// Wire protocol configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Protocol generation spoken by the device fleet
    #[serde(default)]
    pub generation: Generation,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log output (stdout, stderr)
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:18888".to_string()
}

fn default_accept_timeout_ms() -> u64 {
    250
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./imu_data")
}

fn default_shard_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

fn default_tcp_buffer_size() -> usize {
    1024
}

fn default_poll_timeout_ms() -> u64 {
    250
}

fn default_idle_sleep_ms() -> u64 {
    10
}

fn default_queue_depth() -> usize {
    64
}

fn default_shutdown_grace_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            accept_timeout_ms: default_accept_timeout_ms(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            shard_count: default_shard_count(),
            tcp_buffer_size: default_tcp_buffer_size(),
            poll_timeout_ms: default_poll_timeout_ms(),
            idle_sleep_ms: default_idle_sleep_ms(),
            queue_depth: default_queue_depth(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// - `path`: Path to TOML configuration file
    ///
    /// # Returns
    /// Parsed configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, falling back to defaults if absent
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::info!(
                "Config {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
