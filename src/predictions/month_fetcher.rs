use crate::predictions::api::{MonthRequest, PredictionApi};
use crate::predictions::error::FetchError;
use crate::predictions::table::{is_unavailable, parse_month_table};
use crate::types::month_window::MonthWindow;
use crate::types::series::MonthSeries;
use crate::types::station::{Station, StationCategory};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// How often and how patiently a month request is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Request parameters that do not depend on the station or the month.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    pub units: String,
    pub time_zone: String,
    pub harmonic_interval: String,
    pub subordinate_interval: String,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            units: "english".to_string(),
            time_zone: "gmt".to_string(),
            harmonic_interval: "6".to_string(),
            subordinate_interval: "MAX_SLACK".to_string(),
        }
    }
}

/// Fetches one month of predictions for one station, classifying and retrying failures.
pub struct MonthFetcher {
    api: Arc<dyn PredictionApi>,
    retry: RetryPolicy,
    settings: RequestSettings,
}

impl MonthFetcher {
    pub fn new(api: Arc<dyn PredictionApi>, retry: RetryPolicy, settings: RequestSettings) -> Self {
        Self {
            api,
            retry,
            settings,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn request_for(&self, window: MonthWindow, station: &Station) -> MonthRequest {
        let interval = match station.category {
            StationCategory::Subordinate => &self.settings.subordinate_interval,
            _ => &self.settings.harmonic_interval,
        };
        MonthRequest {
            station: station.id.clone(),
            bin: station.bin,
            window,
            interval: interval.clone(),
            units: self.settings.units.clone(),
            time_zone: self.settings.time_zone.clone(),
        }
    }

    /// Every failure class is retried the same way; after the last attempt the last
    /// classified failure is returned.
    pub async fn fetch(
        &self,
        window: MonthWindow,
        station: &Station,
    ) -> Result<MonthSeries, FetchError> {
        let request = self.request_for(window, station);
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(&request).await {
                Ok(series) => {
                    debug!(
                        "Fetched {} samples for station {} in {} (attempt {})",
                        series.len(),
                        station.id,
                        window,
                        attempt
                    );
                    return Ok(series);
                }
                Err(e) if attempt >= attempts => {
                    warn!(
                        "Giving up on station {} {} after {} attempts: {}",
                        station.id, window, attempts, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} for station {} {} failed ({:?}): {}",
                        attempt,
                        attempts,
                        station.id,
                        window,
                        e.kind(),
                        e
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, request: &MonthRequest) -> Result<MonthSeries, FetchError> {
        let body = self.api.request_month(request).await?;
        if is_unavailable(&body) {
            return Err(FetchError::Unavailable {
                station: request.station.clone(),
                window: request.window,
            });
        }
        let samples = parse_month_table(&body, &request.station, request.window)?;
        MonthSeries::new(request.window, samples).map_err(|_| FetchError::Empty {
            station: request.station.clone(),
            window: request.window,
        })
    }
}
