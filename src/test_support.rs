//! Stub prediction endpoint and fixtures shared by the scheduler and client tests.

use crate::predictions::api::{MonthRequest, PredictionApi};
use crate::predictions::error::FetchError;
use crate::predictions::month_fetcher::{MonthFetcher, RequestSettings, RetryPolicy};
use crate::predictions::season::SeasonAggregator;
use crate::types::month_window::MonthWindow;
use crate::types::station::{Location, Station, StationCategory};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn station(id: &str, category: StationCategory) -> Station {
    Station {
        id: id.to_string(),
        name: format!("Station {}", id),
        category,
        location: Location {
            latitude: 41.0,
            longitude: -71.0,
        },
        bin: None,
    }
}

pub fn tidal_velocity(minutes_since_epoch: i64) -> f64 {
    let hours = minutes_since_epoch as f64 / 60.0;
    1.8 * (2.0 * std::f64::consts::PI * hours / 12.42).sin()
}

/// Serves a regular table for every month. Stations can be made to fail a number of
/// calls first, or to fail one month for good.
pub struct SeasonApi {
    interval_minutes: i64,
    failing_calls: Mutex<HashMap<String, usize>>,
    broken: HashMap<String, MonthWindow>,
    calls: Mutex<HashMap<String, usize>>,
}

impl SeasonApi {
    pub fn new(interval_minutes: i64) -> Self {
        Self {
            interval_minutes,
            failing_calls: Mutex::new(HashMap::new()),
            broken: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing_first(self, station: &str, calls: usize) -> Self {
        self.failing_calls
            .lock()
            .unwrap()
            .insert(station.to_string(), calls);
        self
    }

    pub fn broken_month(mut self, station: &str, window: MonthWindow) -> Self {
        self.broken.insert(station.to_string(), window);
        self
    }

    pub fn calls(&self, station: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(station)
            .copied()
            .unwrap_or(0)
    }

    fn table(&self, window: MonthWindow) -> String {
        let mut body = String::from("Date_Time (LST/LDT), Velocity_Major\n");
        let mut time = window.start_date().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let end = window.next().start_date().and_hms_opt(0, 0, 0).unwrap().and_utc();
        while time < end {
            let velocity = tidal_velocity(time.timestamp() / 60);
            body.push_str(&format!("{}, {:.3}\n", time.format("%Y-%m-%d %H:%M"), velocity));
            time += Duration::minutes(self.interval_minutes);
        }
        body
    }
}

#[async_trait]
impl PredictionApi for SeasonApi {
    async fn request_month(&self, request: &MonthRequest) -> Result<String, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.station.clone())
            .or_insert(0) += 1;

        if self.broken.get(&request.station) == Some(&request.window) {
            return Ok("Error: predictions not available for this month".to_string());
        }
        {
            let mut failing = self.failing_calls.lock().unwrap();
            if let Some(remaining) = failing.get_mut(&request.station) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::HttpStatus {
                        url: "stub".to_string(),
                        status: 503,
                    });
                }
            }
        }
        Ok(self.table(request.window))
    }
}

/// Five attempts per month, no delay between them.
pub fn aggregator(api: Arc<dyn PredictionApi>) -> SeasonAggregator {
    let retry = RetryPolicy {
        max_attempts: 5,
        delay: std::time::Duration::ZERO,
    };
    SeasonAggregator::new(Arc::new(MonthFetcher::new(
        api,
        retry,
        RequestSettings::default(),
    )))
}
