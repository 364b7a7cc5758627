use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::resource::ResourceKind;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
    #[error("no configuration directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: ResourceKind, name: String },
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("worker pool is closed")]
    PoolClosed,
    #[error("worker job exceeded its {}s deadline", .0.as_secs_f64())]
    Deadline(std::time::Duration),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("health check cycle panicked")]
    CheckPanicked,
    #[error("resource source failed: {0}")]
    Source(String),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
