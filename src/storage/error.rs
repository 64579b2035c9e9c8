use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create station folder '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing table '{0}'")]
    WriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing table '{0}'")]
    WritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to open table '{0}'")]
    ReadIo(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode table '{0}'")]
    ReadPolars(PathBuf, #[source] PolarsError),

    #[error("Unexpected content in '{path}': {message}")]
    Content { path: PathBuf, message: String },

    #[error("Failed to remove '{0}'")]
    Remove(PathBuf, #[source] std::io::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
