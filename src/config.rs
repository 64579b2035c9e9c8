use crate::predictions::api::DEFAULT_API_URL;
use crate::predictions::month_fetcher::{RequestSettings, RetryPolicy};
use crate::stations::metadata::DEFAULT_METADATA_URL;
use crate::storage::store::TableFormat;
use bon::Builder;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for one pipeline run. Every field has a default.
///
/// ```
/// use tidal_currents::{PipelineConfig, TableFormat};
///
/// let config = PipelineConfig::builder()
///     .data_dir("/tmp/currents")
///     .workers(4)
///     .table_format(TableFormat::Parquet)
///     .build();
/// assert_eq!(config.max_attempts, 5);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct PipelineConfig {
    /// Root of the station folders and the catalog. `None` resolves to the
    /// platform data directory.
    #[builder(into)]
    pub data_dir: Option<PathBuf>,

    #[builder(into, default = DEFAULT_API_URL.to_string())]
    pub api_base_url: String,

    #[builder(into, default = DEFAULT_METADATA_URL.to_string())]
    pub metadata_base_url: String,

    /// Number of station jobs running at once.
    #[builder(default = default_workers())]
    pub workers: usize,

    #[builder(default = 5)]
    pub max_attempts: usize,

    #[builder(default = Duration::from_secs(1))]
    pub retry_delay: Duration,

    #[builder(into, default = String::from("english"))]
    pub units: String,

    #[builder(into, default = String::from("gmt"))]
    pub time_zone: String,

    #[builder(into, default = String::from("6"))]
    pub harmonic_interval: String,

    #[builder(into, default = String::from("MAX_SLACK"))]
    pub subordinate_interval: String,

    #[builder(default)]
    pub table_format: TableFormat,

    /// Keep a subordinate station's downloaded season after its dense series is written.
    #[builder(default = false)]
    pub keep_raw_after_resample: bool,

    /// Pending stations are listed by name once at most this many remain.
    #[builder(default = 10)]
    pub progress_detail_threshold: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: self.retry_delay,
        }
    }

    pub fn request_settings(&self) -> RequestSettings {
        RequestSettings {
            units: self.units.clone(),
            time_zone: self.time_zone.clone(),
            harmonic_interval: self.harmonic_interval.clone(),
            subordinate_interval: self.subordinate_interval.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_request_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.request_settings(), RequestSettings::default());
        assert!(config.workers >= 1);
        assert_eq!(config.table_format, TableFormat::Csv);
        assert!(!config.keep_raw_after_resample);
        assert_eq!(config.progress_detail_threshold, 10);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = PipelineConfig::builder()
            .data_dir("/data")
            .max_attempts(2)
            .retry_delay(Duration::ZERO)
            .subordinate_interval("30")
            .build();
        assert_eq!(config.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(config.retry_policy().max_attempts, 2);
        assert_eq!(config.request_settings().subordinate_interval, "30");
    }
}
