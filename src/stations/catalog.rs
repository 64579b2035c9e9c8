use crate::stations::error::CatalogError;
use crate::stations::metadata::MetadataApi;
use crate::types::station::{shallowest_bin, Location, Station, StationCategory};
use futures_util::{stream, StreamExt};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const CATALOG_FILE_NAME: &str = "stations.json";

/// Marker that excludes a station when it appears in its id.
const EXCLUSION_MARKER: char = '#';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CatalogEntry {
    #[serde(flatten)]
    station: Station,
    #[serde(default)]
    excluded: bool,
}

/// The stations of a run, keyed and iterated by id, with the operator's exclusions.
///
/// The catalog is persisted as JSON next to the station folders. Every exclusion is
/// written through immediately, so an excluded station stays excluded in later runs.
#[derive(Debug, Clone)]
pub struct StationCatalog {
    path: PathBuf,
    entries: BTreeMap<String, CatalogEntry>,
}

impl StationCatalog {
    /// Loads the catalog from `path`, or builds it from the metadata API and saves it
    /// there if the file does not exist yet.
    pub async fn load_or_fetch(
        path: &Path,
        api: &dyn MetadataApi,
        concurrency: usize,
    ) -> Result<Self, CatalogError> {
        if path.exists() {
            let catalog = Self::load(path).await?;
            info!(
                "Loaded {} stations ({} excluded) from {}",
                catalog.len(),
                catalog.excluded_count(),
                path.display()
            );
            return Ok(catalog);
        }

        info!("Catalog file not found. Fetching station metadata");
        let stations = Self::fetch_stations(api, concurrency).await?;
        let catalog = Self::from_stations(path, stations);
        catalog.save().await?;
        info!(
            "Saved {} stations to {}",
            catalog.len(),
            catalog.path.display()
        );
        Ok(catalog)
    }

    /// A catalog that will be saved to `path`. Nothing is written until it changes.
    pub fn from_stations(path: impl Into<PathBuf>, stations: Vec<Station>) -> Self {
        let entries = stations
            .into_iter()
            .map(|station| {
                let excluded = station.id.contains(EXCLUSION_MARKER);
                (station.id.clone(), CatalogEntry { station, excluded })
            })
            .collect();
        Self {
            path: path.into(),
            entries,
        }
    }

    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let owned = path.to_path_buf();
        let entries: Vec<CatalogEntry> = tokio::task::spawn_blocking(move || {
            let bytes =
                std::fs::read(&owned).map_err(|e| CatalogError::CacheRead(owned.clone(), e))?;
            serde_json::from_slice(&bytes).map_err(|e| CatalogError::CacheDecode(owned, e))
        })
        .await??;

        let entries = entries
            .into_iter()
            .map(|mut entry| {
                entry.excluded |= entry.station.id.contains(EXCLUSION_MARKER);
                (entry.station.id.clone(), entry)
            })
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    async fn fetch_stations(
        api: &dyn MetadataApi,
        concurrency: usize,
    ) -> Result<Vec<Station>, CatalogError> {
        let listings = api.stations().await?;
        let mut stations = Vec::with_capacity(listings.len());
        for listing in listings {
            let category = match listing.category.parse::<StationCategory>() {
                Ok(category) => category,
                Err(_) => {
                    warn!(
                        "{}",
                        CatalogError::UnknownCategory {
                            station: listing.id.clone(),
                            code: listing.category.clone(),
                        }
                    );
                    continue;
                }
            };
            stations.push(Station {
                id: listing.id,
                name: listing.name,
                category,
                location: Location {
                    latitude: listing.latitude,
                    longitude: listing.longitude,
                },
                bin: None,
            });
        }

        // weak stations are never requested, so their bins are not needed
        let stations: Vec<Station> = stream::iter(stations)
            .map(|mut station| async move {
                if station.category.requires_data() {
                    match api.bins(&station.id).await {
                        Ok(bins) => station.bin = shallowest_bin(&bins),
                        Err(e) => warn!(
                            "No depth bins for station {}, requesting without a bin: {}",
                            station.id, e
                        ),
                    }
                }
                station
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        Ok(stations)
    }

    async fn save(&self) -> Result<(), CatalogError> {
        let entries: Vec<CatalogEntry> = self.entries.values().cloned().collect();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let json = serde_json::to_vec_pretty(&entries).map_err(CatalogError::CacheEncode)?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir).map_err(|e| CatalogError::CacheWrite(dir.clone(), e))?;
            let mut temp_file =
                NamedTempFile::new_in(&dir).map_err(|e| CatalogError::CacheWrite(path.clone(), e))?;
            std::io::Write::write_all(&mut temp_file, &json)
                .map_err(|e| CatalogError::CacheWrite(path.clone(), e))?;
            temp_file
                .persist(&path)
                .map_err(|e| CatalogError::CacheWrite(path.clone(), e.error))?;
            Ok::<(), CatalogError>(())
        })
        .await?
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn excluded_count(&self) -> usize {
        self.entries.values().filter(|e| e.excluded).count()
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.entries.get(id).map(|e| &e.station)
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|e| e.excluded)
    }

    /// Every station, excluded or not, sorted by id.
    pub fn all(&self) -> impl Iterator<Item = &Station> {
        self.entries.values().map(|e| &e.station)
    }

    /// Stations that are not excluded, sorted by id.
    pub fn active(&self) -> impl Iterator<Item = &Station> {
        self.entries
            .values()
            .filter(|e| !e.excluded)
            .map(|e| &e.station)
    }

    /// Removes a station from all further processing and saves the catalog.
    /// Returns `false` if it was already excluded.
    pub async fn exclude(&mut self, id: &str) -> Result<bool, CatalogError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| CatalogError::UnknownStation(id.to_string()))?;
        if entry.excluded {
            return Ok(false);
        }
        entry.excluded = true;
        self.save().await?;
        info!("Excluded station {}", id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::station::DepthBin;
    use crate::stations::metadata::StationListing;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubMetadata {
        bin_calls: AtomicUsize,
    }

    fn listing(id: &str, category: &str) -> StationListing {
        StationListing {
            id: id.to_string(),
            name: format!("Station {}", id),
            category: category.to_string(),
            latitude: 40.0,
            longitude: -70.0,
        }
    }

    #[async_trait]
    impl MetadataApi for StubMetadata {
        async fn stations(&self) -> Result<Vec<StationListing>, CatalogError> {
            Ok(vec![
                listing("S2", "S"),
                listing("H1", "H"),
                listing("W1", "W"),
                listing("X1", "Q"),
                listing("H#9", "H"),
            ])
        }

        async fn bins(&self, station: &str) -> Result<Vec<DepthBin>, CatalogError> {
            self.bin_calls.fetch_add(1, Ordering::SeqCst);
            Ok(match station {
                "S2" => vec![
                    DepthBin {
                        number: 1,
                        depth: Some(20.0),
                    },
                    DepthBin {
                        number: 4,
                        depth: Some(3.5),
                    },
                ],
                _ => vec![],
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_builds_sorted_catalog_with_bins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CATALOG_FILE_NAME);
        let api = StubMetadata {
            bin_calls: AtomicUsize::new(0),
        };
        let catalog = StationCatalog::load_or_fetch(&path, &api, 4).await.unwrap();

        let ids: Vec<_> = catalog.all().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["H#9", "H1", "S2", "W1"]);
        assert_eq!(catalog.get("S2").unwrap().bin, Some(4));
        assert_eq!(catalog.get("H1").unwrap().bin, None);
        assert!(catalog.is_excluded("H#9"));
        // no bin lookup for the weak station
        assert_eq!(api.bin_calls.load(Ordering::SeqCst), 3);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_exclusion_is_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CATALOG_FILE_NAME);
        let api = StubMetadata {
            bin_calls: AtomicUsize::new(0),
        };
        let mut catalog = StationCatalog::load_or_fetch(&path, &api, 2).await.unwrap();
        assert!(catalog.exclude("S2").await.unwrap());
        assert!(!catalog.exclude("S2").await.unwrap());
        assert!(matches!(
            catalog.exclude("nope").await,
            Err(CatalogError::UnknownStation(_))
        ));

        let reloaded = StationCatalog::load_or_fetch(&path, &api, 2).await.unwrap();
        let active: Vec<_> = reloaded.active().map(|s| s.id.as_str()).collect();
        assert_eq!(active, ["H1", "W1"]);
        assert_eq!(reloaded.excluded_count(), 2);
        // the second load came from disk
        assert_eq!(api.bin_calls.load(Ordering::SeqCst), 3);
    }

    struct FlakyBins;

    #[async_trait]
    impl MetadataApi for FlakyBins {
        async fn stations(&self) -> Result<Vec<StationListing>, CatalogError> {
            Ok(vec![listing("A", "S"), listing("B", "S"), listing("C", "H")])
        }

        async fn bins(&self, station: &str) -> Result<Vec<DepthBin>, CatalogError> {
            match station {
                "B" => Err(CatalogError::UnknownStation(station.to_string())),
                _ => Ok(vec![DepthBin {
                    number: 2,
                    depth: Some(4.0),
                }]),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_bin_lookup_keeps_station_without_bin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CATALOG_FILE_NAME);
        let catalog = StationCatalog::load_or_fetch(&path, &FlakyBins, 2)
            .await
            .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("A").unwrap().bin, Some(2));
        assert_eq!(catalog.get("B").unwrap().bin, None);
        assert!(!catalog.is_excluded("B"));
        assert_eq!(catalog.get("C").unwrap().bin, Some(2));
    }

    #[tokio::test]
    async fn test_marker_in_hand_edited_file_excludes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CATALOG_FILE_NAME);
        let json = r##"[
            {"id": "#ACT0091", "name": "Eastport", "category": "H",
             "location": {"latitude": 44.9, "longitude": -66.98}, "bin": null},
            {"id": "ACT0146", "name": "Lubec", "category": "S",
             "location": {"latitude": 44.8, "longitude": -66.9}, "bin": 2}
        ]"##;
        std::fs::write(&path, json).unwrap();

        let catalog = StationCatalog::load(&path).await.unwrap();
        assert!(catalog.is_excluded("#ACT0091"));
        assert!(!catalog.is_excluded("ACT0146"));
        assert_eq!(catalog.get("ACT0146").unwrap().bin, Some(2));
    }
}
