mod config;
mod error;
mod jobs;
mod pipeline;
mod predictions;
mod schedule;
mod spline;
mod stations;
mod storage;
mod types;
mod utils;

#[cfg(test)]
mod test_support;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError};
pub use pipeline::*;

pub use jobs::{InlineExecutor, Job, JobError, JobExecutor, JobHandle, TokioJobPool};

pub use predictions::api::{MonthRequest, NoaaPredictionApi, PredictionApi, DEFAULT_API_URL};
pub use predictions::error::{FetchError, SeasonError};
pub use predictions::month_fetcher::{MonthFetcher, RequestSettings, RetryPolicy};
pub use predictions::season::SeasonAggregator;
pub use predictions::table::{is_unavailable, parse_month_table};

pub use schedule::acquisition::{AcquisitionOutcome, AcquisitionScheduler};
pub use schedule::decision::{
    AlwaysExclude, AlwaysRetry, ConsoleDecider, Decision, ExcludeAfterRounds, FailureDecider,
};
pub use schedule::error::{AcquisitionError, ResampleError};
pub use schedule::resampling::{ResampleOutcome, ResamplingScheduler};
pub use schedule::state::{
    AcquisitionReport, AcquisitionState, ResampleReport, RoundReport, StationFailure,
};

pub use spline::cubic::CubicSpline;
pub use spline::resampler::SplineResampler;

pub use stations::catalog::{StationCatalog, CATALOG_FILE_NAME};
pub use stations::error::CatalogError;
pub use stations::metadata::{MetadataApi, NoaaMetadataApi, StationListing, DEFAULT_METADATA_URL};

pub use storage::error::StorageError;
pub use storage::frame::{
    frame_to_samples, samples_to_frame, STAMP_COLUMN, TIME_COLUMN, VELOCITY_COLUMN,
};
pub use storage::store::{Artifact, StationStore, TableFormat};

pub use types::month_window::{MonthWindow, SEASON_MONTHS};
pub use types::series::{DenseSeries, MonthSeries, RawSample, SeasonSeries, SeriesError};
pub use types::station::{shallowest_bin, DepthBin, Location, Station, StationCategory};

pub use utils::{default_data_dir, ensure_dir_exists};
