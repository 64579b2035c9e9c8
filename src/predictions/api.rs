//! The remote prediction endpoint, behind a trait so runs can be driven by a stub.

use crate::predictions::error::FetchError;
use crate::types::month_window::MonthWindow;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

pub const DEFAULT_API_URL: &str = "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter";
const PRODUCT: &str = "currents_predictions";
const APPLICATION: &str = "tidal_currents";

/// Everything needed to ask for one month of predictions for one station.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthRequest {
    pub station: String,
    pub bin: Option<u32>,
    pub window: MonthWindow,
    pub interval: String,
    pub units: String,
    pub time_zone: String,
}

impl MonthRequest {
    /// Query parameters for the datagetter endpoint.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("product", PRODUCT.to_string()),
            ("application", APPLICATION.to_string()),
            ("format", "csv".to_string()),
            ("station", self.station.clone()),
            (
                "begin_date",
                self.window.start_date().format("%Y%m%d").to_string(),
            ),
            (
                "end_date",
                self.window.end_date().format("%Y%m%d").to_string(),
            ),
            ("interval", self.interval.clone()),
            ("units", self.units.clone()),
            ("time_zone", self.time_zone.clone()),
        ];
        if let Some(bin) = self.bin {
            query.push(("bin", bin.to_string()));
        }
        query
    }
}

/// Source of raw month payloads.
///
/// Implementations return the response body on any 2xx response and report only
/// transport-level problems as errors; classifying the body is the caller's job.
#[async_trait]
pub trait PredictionApi: Send + Sync {
    async fn request_month(&self, request: &MonthRequest) -> Result<String, FetchError>;
}

/// [`PredictionApi`] backed by the NOAA CO-OPS datagetter.
pub struct NoaaPredictionApi {
    client: Client,
    base_url: String,
}

impl NoaaPredictionApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PredictionApi for NoaaPredictionApi {
    async fn request_month(&self, request: &MonthRequest) -> Result<String, FetchError> {
        let url = format!(
            "{}?station={}&begin={}",
            self.base_url,
            request.station,
            request.window
        );
        debug!("Requesting {}", url);

        let response = self
            .client
            .get(&self.base_url)
            .query(&request.query())
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest {
                url: url.clone(),
                source: e,
            })?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(match e.status() {
                    Some(status) => FetchError::HttpStatus {
                        url,
                        status: status.as_u16(),
                    },
                    None => FetchError::NetworkRequest { url, source: e },
                });
            }
        };

        response
            .text()
            .await
            .map_err(|e| FetchError::NetworkRequest { url, source: e })
    }
}
