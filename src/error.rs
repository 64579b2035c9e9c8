use crate::stations::error::CatalogError;
use crate::storage::error::StorageError;
use crate::types::series::SeriesError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure class of a station job, used by schedulers and decision policies to
/// branch without inspecting the error chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    DataUnavailable,
    EmptyResult,
    Malformed,
    NonMonotonic,
    DuplicateTimestamp,
    InsufficientData,
    Numerical,
    SeasonIncomplete,
    Storage,
    Job,
}

impl ErrorKind {
    /// Data-quality faults that another round will not fix.
    pub fn is_data_fault(&self) -> bool {
        matches!(
            self,
            ErrorKind::NonMonotonic
                | ErrorKind::DuplicateTimestamp
                | ErrorKind::InsufficientData
                | ErrorKind::Numerical
        )
    }
}

impl From<&SeriesError> for ErrorKind {
    fn from(error: &SeriesError) -> Self {
        match error {
            SeriesError::Empty(_) => ErrorKind::EmptyResult,
            SeriesError::NonMonotonic { .. } => ErrorKind::NonMonotonic,
            SeriesError::DuplicateTimestamp { .. } => ErrorKind::DuplicateTimestamp,
            SeriesError::InsufficientPoints { .. } => ErrorKind::InsufficientData,
            SeriesError::IllConditioned { .. } => ErrorKind::Numerical,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Data path '{0}' exists but is not a directory")]
    DataDirNotADirectory(PathBuf),

    #[error("Failed to determine data directory")]
    DataDirResolution,

    #[error("Year {0} is outside the supported range")]
    InvalidYear(i32),
}
