use crate::error::ErrorKind;
use crate::jobs::JobError;
use crate::predictions::error::SeasonError;
use crate::storage::error::StorageError;
use crate::types::series::SeriesError;
use thiserror::Error;

/// Why a station's acquisition job failed in a round.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Season(#[from] SeasonError),

    #[error("Failed to store season for station {station}")]
    Storage {
        station: String,
        #[source]
        source: StorageError,
    },

    #[error("Acquisition job for station {station} did not complete")]
    Job {
        station: String,
        #[source]
        source: JobError,
    },
}

impl AcquisitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AcquisitionError::Season(e) => e.kind(),
            AcquisitionError::Storage { .. } => ErrorKind::Storage,
            AcquisitionError::Job { .. } => ErrorKind::Job,
        }
    }
}

/// Why a station could not be resampled.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Season of station {station} cannot be resampled")]
    Series {
        station: String,
        #[source]
        source: SeriesError,
    },

    #[error("Storage failed while resampling station {station}")]
    Storage {
        station: String,
        #[source]
        source: StorageError,
    },

    #[error("Resampling job for station {station} did not complete")]
    Job {
        station: String,
        #[source]
        source: JobError,
    },
}

impl ResampleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResampleError::Series { source, .. } => ErrorKind::from(source),
            ResampleError::Storage { .. } => ErrorKind::Storage,
            ResampleError::Job { .. } => ErrorKind::Job,
        }
    }
}
