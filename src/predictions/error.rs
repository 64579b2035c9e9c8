use crate::error::ErrorKind;
use crate::types::month_window::MonthWindow;
use crate::types::series::SeriesError;
use thiserror::Error;

/// A classified failure of one month request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request failed for {url}")]
    NetworkRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Predictions not available for station {station} in {window}")]
    Unavailable { station: String, window: MonthWindow },

    #[error("Empty prediction table for station {station} in {window}")]
    Empty { station: String, window: MonthWindow },

    #[error("Could not read prediction table for station {station} in {window}: {detail}")]
    Malformed {
        station: String,
        window: MonthWindow,
        detail: String,
    },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::NetworkRequest { .. } | FetchError::HttpStatus { .. } => {
                ErrorKind::Transport
            }
            FetchError::Unavailable { .. } => ErrorKind::DataUnavailable,
            FetchError::Empty { .. } => ErrorKind::EmptyResult,
            FetchError::Malformed { .. } => ErrorKind::Malformed,
        }
    }
}

/// Failure of a whole season acquisition. A season is all-or-nothing.
#[derive(Debug, Error)]
pub enum SeasonError {
    #[error("Season incomplete for station {station}: month {window} failed")]
    Incomplete {
        station: String,
        window: MonthWindow,
        #[source]
        source: FetchError,
    },

    #[error("Season for station {station} failed validation")]
    Invalid {
        station: String,
        #[source]
        source: SeriesError,
    },
}

impl SeasonError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SeasonError::Incomplete { .. } => ErrorKind::SeasonIncomplete,
            SeasonError::Invalid { source, .. } => ErrorKind::from(source),
        }
    }

    /// The failure class of the month that broke the season, if a month did.
    pub fn month_kind(&self) -> Option<ErrorKind> {
        match self {
            SeasonError::Incomplete { source, .. } => Some(source.kind()),
            SeasonError::Invalid { .. } => None,
        }
    }
}
