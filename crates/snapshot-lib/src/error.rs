//! Error types for the fetch and store stages
//!
//! Collectors never propagate these past their own loop; they are logged,
//! counted in the collector report and then dropped.

use thiserror::Error;

/// Errors raised while reading a resource list from the control plane
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid control-plane url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned http status {status}")]
    Status { path: String, status: u16 },

    #[error("failed to read response body of {path}: {source}")]
    Body {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response of {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by a record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("internal error: {0}")]
    Internal(String),
}
