//! Error types for DharaIO

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// DharaIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    /// Session directory could not be created (fatal to the shard)
    #[error("Failed to create session directory {path}: {source}")]
    SessionDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// Capture sink file could not be opened (fatal to the shard)
    #[error("Failed to open capture sink {path}: {source}")]
    SinkOpen {
        /// Sink file path
        path: PathBuf,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// Connection id is not registered in this shard
    #[error("Unknown connection id: {0}")]
    UnknownConnection(u32),

    /// A shard terminated with an error
    #[error("Shard {shard} failed: {message}")]
    ShardFailed {
        /// Shard index
        shard: usize,
        /// Failure description from the shard's finish report
        message: String,
    },

    /// A shard did not acknowledge shutdown within the grace period
    #[error("Shard {0} did not stop within the grace period")]
    ShardStalled(usize),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
