use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write catalog file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode catalog file '{0}'")]
    CacheDecode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to encode catalog")]
    CacheEncode(#[source] serde_json::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse station metadata from {url}")]
    JsonParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Station {station} has unknown category '{code}'")]
    UnknownCategory { station: String, code: String },

    #[error("Station '{0}' is not in the catalog")]
    UnknownStation(String),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
