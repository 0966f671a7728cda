//! Error types for the radar pipeline.
//!
//! Errors are split by blast radius:
//!
//! - [`SourceError`]: anything that goes wrong while polling one source. These
//!   never leave the adapter boundary in the coordinator; they become a failed
//!   [`FetchOutcome`](crate::sources::FetchOutcome) for that source only.
//! - [`StateError`]: reading or writing the persisted seen-set or last-alert
//!   marker. Fatal for the run.
//! - [`ConfigError`]: the YAML configuration or a keyword pattern is invalid.
//!   Fatal at startup.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed feed from {url}: {reason}")]
    Feed { url: String, reason: String },

    #[error("invalid listing url {0:?}")]
    InvalidUrl(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt seen snapshot {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid keyword pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}
