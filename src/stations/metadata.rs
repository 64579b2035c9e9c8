//! Station metadata (the list of current-prediction stations and their depth bins),
//! behind a trait so the catalog can be built from a stub.

use crate::stations::error::CatalogError;
use crate::types::station::DepthBin;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_METADATA_URL: &str = "https://api.tidesandcurrents.noaa.gov/mdapi/prod/webapi";

/// One entry of the station list, before its category is checked.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationListing {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub category: String,
    #[serde(rename = "lat", default)]
    pub latitude: f64,
    #[serde(rename = "lng", default)]
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct StationListResponse {
    #[serde(default)]
    stations: Vec<StationListing>,
}

#[derive(Debug, Deserialize)]
struct BinRecord {
    num: u32,
    #[serde(default)]
    depth: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BinListResponse {
    #[serde(default)]
    bins: Vec<BinRecord>,
}

#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn stations(&self) -> Result<Vec<StationListing>, CatalogError>;

    async fn bins(&self, station: &str) -> Result<Vec<DepthBin>, CatalogError>;
}

/// [`MetadataApi`] backed by the NOAA CO-OPS metadata API.
pub struct NoaaMetadataApi {
    client: Client,
    base_url: String,
}

impl NoaaMetadataApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, CatalogError> {
        debug!("Requesting {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(match e.status() {
                    Some(status) => CatalogError::HttpStatus {
                        url,
                        status,
                        source: e,
                    },
                    None => CatalogError::NetworkRequest(url, e),
                });
            }
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CatalogError::NetworkRequest(url.clone(), e))?;
        serde_json::from_slice(&bytes).map_err(|e| CatalogError::JsonParse { url, source: e })
    }
}

#[async_trait]
impl MetadataApi for NoaaMetadataApi {
    async fn stations(&self) -> Result<Vec<StationListing>, CatalogError> {
        let url = format!("{}/stations.json?type=currentpredictions", self.base_url);
        let response: StationListResponse = self.get_json(url).await?;
        Ok(response.stations)
    }

    async fn bins(&self, station: &str) -> Result<Vec<DepthBin>, CatalogError> {
        let url = format!("{}/stations/{}/bins.json", self.base_url, station);
        let response: BinListResponse = self.get_json(url).await?;
        Ok(response
            .bins
            .into_iter()
            .map(|b| DepthBin {
                number: b.num,
                depth: b.depth,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_list_decodes_with_missing_fields() {
        let json = r#"{
            "count": 2,
            "stations": [
                {"id": "ACT0091", "name": "Eastport", "lat": 44.9, "lng": -66.98, "type": "H", "currbin": 1},
                {"id": "ACT0146"}
            ]
        }"#;
        let response: StationListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.stations.len(), 2);
        assert_eq!(response.stations[0].category, "H");
        assert_eq!(response.stations[0].longitude, -66.98);
        assert_eq!(response.stations[1].name, "");
        assert_eq!(response.stations[1].category, "");
    }

    #[test]
    fn test_bins_decode_with_null_depth() {
        let json = r#"{"bins": [{"num": 1, "depth": 12.5}, {"num": 2, "depth": null}, {"num": 3}]}"#;
        let response: BinListResponse = serde_json::from_str(json).unwrap();
        let depths: Vec<_> = response.bins.iter().map(|b| (b.num, b.depth)).collect();
        assert_eq!(depths, [(1, Some(12.5)), (2, None), (3, None)]);
    }
}
