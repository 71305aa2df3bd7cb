use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort an evaluation before a decision can be produced.
///
/// Policy outcomes and expected lookup misses are never represented here;
/// those resolve to a [`Decision`](crate::eval::Decision).
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid event payload: {0}")]
    Event(String),

    #[error("failed to write {path}: {source}")]
    FileCommand {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("post step: {0}")]
    Post(String),

    #[error("failed to create github api client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;
