//! Error types for dnsprune.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for dnsprune operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON state file error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Download error
    #[error("download error: {0}")]
    Download(#[from] reqwest::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Shard index outside `1..=parts`
    #[error("invalid shard index {index} (expected 1..={parts})")]
    InvalidShard { index: usize, parts: usize },

    /// Master corpus absent after a refresh attempt
    #[error("master rule corpus missing: {0:?}")]
    CorpusMissing(PathBuf),

    /// Shard file absent after a refresh attempt
    #[error("shard file missing: {0:?}")]
    ShardMissing(PathBuf),

    /// Resolver construction error
    #[error("resolver error: {0}")]
    Resolver(String),
}

/// Result type alias for dnsprune operations.
pub type Result<T> = std::result::Result<T, Error>;
