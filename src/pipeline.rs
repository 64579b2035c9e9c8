//! The main entry point: a client that owns the station catalog and runs the yearly
//! acquisition and resampling passes against a data folder.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::jobs::TokioJobPool;
use crate::predictions::api::{NoaaPredictionApi, PredictionApi};
use crate::predictions::month_fetcher::MonthFetcher;
use crate::predictions::season::SeasonAggregator;
use crate::schedule::acquisition::AcquisitionScheduler;
use crate::schedule::decision::{ConsoleDecider, FailureDecider};
use crate::schedule::resampling::ResamplingScheduler;
use crate::schedule::state::{AcquisitionReport, ResampleReport};
use crate::stations::catalog::{StationCatalog, CATALOG_FILE_NAME};
use crate::stations::metadata::{MetadataApi, NoaaMetadataApi};
use crate::storage::store::StationStore;
use crate::utils::{default_data_dir, ensure_dir_exists};
use bon::bon;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Summary of a full yearly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub acquisition: AcquisitionReport,
    pub resampling: ResampleReport,
}

/// Client for building the per-minute current velocity files of one season.
///
/// Station folders live under `<data_dir>/<year>/`, the catalog in
/// `<data_dir>/stations.json`. Create an instance with [`TidalCurrents::new()`] for the
/// default data folder and NOAA endpoints, or [`TidalCurrents::with_config()`] to
/// change them.
///
/// # Examples
///
/// ```no_run
/// # use tidal_currents::{TidalCurrents, PipelineConfig, AlwaysRetry, PipelineError};
/// # async fn run() -> Result<(), PipelineError> {
/// let config = PipelineConfig::builder().data_dir("/data/currents").build();
/// let mut client = TidalCurrents::with_config(config).await?;
///
/// // Fetch until every station has data, then resample the subordinate stations.
/// let report = client.run().year(2025).decider(&AlwaysRetry).call().await?;
/// println!("{} stations resampled", report.resampling.succeeded.len());
/// # Ok(())
/// # }
/// ```
pub struct TidalCurrents {
    config: PipelineConfig,
    data_dir: PathBuf,
    catalog: StationCatalog,
    aggregator: SeasonAggregator,
}

#[bon]
impl TidalCurrents {
    /// Creates a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DataDirResolution`] if no platform data directory exists,
    /// or [`PipelineError::Catalog`] if the station catalog can neither be read nor fetched.
    pub async fn new() -> Result<Self, PipelineError> {
        Self::with_config(PipelineConfig::default()).await
    }

    /// Creates a client talking to the NOAA endpoints named in `config`.
    pub async fn with_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let metadata = NoaaMetadataApi::new(config.metadata_base_url.clone());
        let predictions = Arc::new(NoaaPredictionApi::new(config.api_base_url.clone()));
        Self::with_sources(config, &metadata, predictions).await
    }

    /// Creates a client with explicit metadata and prediction sources.
    ///
    /// The data folder is created if needed. The catalog is read from it, or built from
    /// `metadata` and saved on the first run.
    pub async fn with_sources(
        config: PipelineConfig,
        metadata: &dyn MetadataApi,
        predictions: Arc<dyn PredictionApi>,
    ) -> Result<Self, PipelineError> {
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        ensure_dir_exists(&data_dir).await?;

        let catalog = StationCatalog::load_or_fetch(
            &data_dir.join(CATALOG_FILE_NAME),
            metadata,
            config.workers,
        )
        .await?;
        let fetcher = MonthFetcher::new(
            predictions,
            config.retry_policy(),
            config.request_settings(),
        );

        Ok(Self {
            aggregator: SeasonAggregator::new(Arc::new(fetcher)),
            config,
            data_dir,
            catalog,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn catalog(&self) -> &StationCatalog {
        &self.catalog
    }

    /// Drops a station from this and every later run, e.g. after its resampling failed.
    /// Returns `false` if it was already excluded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Catalog`] for an unknown station or if the catalog
    /// cannot be saved.
    pub async fn exclude(&mut self, station: &str) -> Result<bool, PipelineError> {
        Ok(self.catalog.exclude(station).await?)
    }

    /// The station folders of one season.
    pub fn store(&self, year: i32) -> StationStore {
        StationStore::for_year(&self.data_dir, year, self.config.table_format)
    }

    /// Acquires the season of every station still missing data, round after round.
    ///
    /// Failed stations are put to `decider` after each round; without one the operator
    /// is asked on the terminal.
    #[builder]
    pub async fn acquire(
        &mut self,
        year: i32,
        decider: Option<&dyn FailureDecider>,
    ) -> Result<AcquisitionReport, PipelineError> {
        check_year(year)?;
        let scheduler = AcquisitionScheduler::new(
            self.aggregator.clone(),
            self.store(year),
            self.config.progress_detail_threshold,
        );
        let mut pool = TokioJobPool::new(self.config.workers);
        let report = scheduler
            .run(
                year,
                &mut self.catalog,
                &mut pool,
                decider.unwrap_or(&ConsoleDecider),
            )
            .await?;
        Ok(report)
    }

    /// Resamples every subordinate station whose season is stored but not yet resampled.
    #[builder]
    pub async fn resample(&self, year: i32) -> Result<ResampleReport, PipelineError> {
        check_year(year)?;
        let scheduler =
            ResamplingScheduler::new(self.store(year), self.config.keep_raw_after_resample);
        let mut pool = TokioJobPool::new(self.config.workers);
        Ok(scheduler.run(&self.catalog, &mut pool).await)
    }

    /// Runs acquisition to completion, then resampling.
    #[builder]
    pub async fn run(
        &mut self,
        year: i32,
        decider: Option<&dyn FailureDecider>,
    ) -> Result<RunReport, PipelineError> {
        let acquisition = self.acquire().year(year).maybe_decider(decider).call().await?;
        let resampling = self.resample().year(year).call().await?;
        Ok(RunReport {
            acquisition,
            resampling,
        })
    }
}

/// The season spans the neighbouring years, which must be representable too.
fn check_year(year: i32) -> Result<(), PipelineError> {
    let first = year
        .checked_sub(1)
        .and_then(|y| NaiveDate::from_ymd_opt(y, 11, 1));
    let last = year
        .checked_add(1)
        .and_then(|y| NaiveDate::from_ymd_opt(y, 3, 1));
    match (first, last) {
        (Some(_), Some(_)) => Ok(()),
        _ => Err(PipelineError::InvalidYear(year)),
    }
}
