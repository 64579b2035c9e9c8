use crate::jobs::{Job, JobExecutor};
use crate::predictions::season::SeasonAggregator;
use crate::schedule::decision::{Decision, FailureDecider};
use crate::schedule::error::AcquisitionError;
use crate::schedule::state::{AcquisitionReport, AcquisitionState, RoundReport};
use crate::stations::catalog::StationCatalog;
use crate::stations::error::CatalogError;
use crate::storage::store::{Artifact, StationStore};
use crate::types::station::{Station, StationCategory};
use futures_util::FutureExt;
use log::{info, warn};

pub type AcquisitionOutcome = Result<(), AcquisitionError>;

/// Drives every station that needs data to a stored season, round after round.
///
/// A round submits one season job per missing station and waits for all of them.
/// Each failure is then put to the [`FailureDecider`]: excluded stations leave the
/// catalog for good, retried ones stay missing. The missing set is recomputed from
/// disk before the next round, so the loop ends once every station either has its
/// files or has been excluded.
pub struct AcquisitionScheduler {
    aggregator: SeasonAggregator,
    store: StationStore,
    progress_detail_threshold: usize,
}

impl AcquisitionScheduler {
    pub fn new(
        aggregator: SeasonAggregator,
        store: StationStore,
        progress_detail_threshold: usize,
    ) -> Self {
        Self {
            aggregator,
            store,
            progress_detail_threshold,
        }
    }

    /// Whether the station's acquisition output is on disk.
    ///
    /// Harmonic stations are done once their velocity copy exists. Subordinate stations
    /// are done once the season exists, or its dense series already replaced it.
    pub fn has_output(&self, station: &Station) -> bool {
        let velocity = self.store.exists(&station.id, Artifact::Velocity);
        match station.category {
            StationCategory::Subordinate => {
                velocity || self.store.exists(&station.id, Artifact::Season)
            }
            _ => velocity,
        }
    }

    /// Active stations that require data and have no output yet, sorted by id.
    pub fn missing(&self, catalog: &StationCatalog) -> Vec<Station> {
        catalog
            .active()
            .filter(|s| s.category.requires_data())
            .filter(|s| !self.has_output(s))
            .cloned()
            .collect()
    }

    pub async fn run(
        &self,
        year: i32,
        catalog: &mut StationCatalog,
        executor: &mut dyn JobExecutor<AcquisitionOutcome>,
        decider: &dyn FailureDecider,
    ) -> Result<AcquisitionReport, CatalogError> {
        let mut report = AcquisitionReport::default();
        loop {
            let missing = self.missing(catalog);
            if missing.is_empty() {
                info!(
                    "Acquisition for {} complete after {} round(s)",
                    year,
                    report.rounds_run()
                );
                return Ok(report);
            }

            let round = self
                .run_round(report.rounds_run() + 1, year, missing, catalog, executor, decider)
                .await?;
            report.rounds.push(round);
        }
    }

    async fn run_round(
        &self,
        number: usize,
        year: i32,
        missing: Vec<Station>,
        catalog: &mut StationCatalog,
        executor: &mut dyn JobExecutor<AcquisitionOutcome>,
        decider: &dyn FailureDecider,
    ) -> Result<RoundReport, CatalogError> {
        self.log_progress(number, &missing);
        let mut round = RoundReport::new(number, missing.iter().map(|s| s.id.as_str()));

        let mut submitted = Vec::with_capacity(missing.len());
        for station in missing {
            let handle = executor.submit(self.job(year, station.clone()));
            round.set(&station.id, AcquisitionState::InFlight);
            submitted.push((station, handle));
        }
        executor.wait_all().await;

        let mut failed = Vec::new();
        for (station, handle) in submitted {
            let outcome = executor
                .result(handle)
                .unwrap_or_else(|e| {
                    Err(AcquisitionError::Job {
                        station: station.id.clone(),
                        source: e,
                    })
                });
            match outcome {
                Ok(()) => round.set(&station.id, AcquisitionState::Succeeded),
                Err(error) => {
                    warn!(
                        "Round {}: station {} failed ({:?}): {}",
                        number,
                        station.label(),
                        error.kind(),
                        error
                    );
                    failed.push((station, error));
                }
            }
        }

        for (station, error) in failed {
            let (kind, reason) = (error.kind(), error.to_string());
            match decider.decide(&station, &error).await {
                Decision::Exclude => {
                    catalog.exclude(&station.id).await?;
                    info!("Operator excluded station {}", station.label());
                    round.set(&station.id, AcquisitionState::Excluded { kind, reason });
                }
                Decision::Retry => {
                    info!("Operator will retry station {}", station.label());
                    round.set(&station.id, AcquisitionState::Failed { kind, reason });
                }
            }
        }
        Ok(round)
    }

    fn log_progress(&self, round: usize, missing: &[Station]) {
        if missing.len() <= self.progress_detail_threshold {
            let names: Vec<String> = missing.iter().map(Station::label).collect();
            info!(
                "Round {}: {} station(s) pending: {}",
                round,
                missing.len(),
                names.join(", ")
            );
        } else {
            info!("Round {}: {} stations pending", round, missing.len());
        }
    }

    /// Fetches the season and commits it. Nothing is written unless every month arrived.
    fn job(&self, year: i32, station: Station) -> Job<AcquisitionOutcome> {
        let aggregator = self.aggregator.clone();
        let store = self.store.clone();
        async move {
            let season = aggregator.acquire(year, &station).await?;
            let storage = |source| AcquisitionError::Storage {
                station: station.id.clone(),
                source,
            };
            store
                .write_season(&station.id, &season)
                .await
                .map_err(storage)?;
            if station.category == StationCategory::Harmonic {
                // harmonic predictions are dense already and are used as fetched
                store
                    .write_samples(&station.id, Artifact::Velocity, season.samples().to_vec())
                    .await
                    .map_err(storage)?;
            }
            Ok::<(), AcquisitionError>(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::jobs::{InlineExecutor, TokioJobPool};
    use crate::schedule::decision::{AlwaysExclude, AlwaysRetry, ExcludeAfterRounds};
    use crate::storage::store::TableFormat;
    use crate::test_support::{aggregator, station, SeasonApi};
    use crate::types::month_window::MonthWindow;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: StationStore,
        catalog: StationCatalog,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = StationStore::for_year(dir.path(), 2024, TableFormat::Csv);
        let catalog = StationCatalog::from_stations(
            dir.path().join("stations.json"),
            vec![
                station("H1", StationCategory::Harmonic),
                station("S1", StationCategory::Subordinate),
                station("S2", StationCategory::Subordinate),
                station("W1", StationCategory::Weak),
            ],
        );
        Fixture {
            _dir: dir,
            store,
            catalog,
        }
    }

    #[tokio::test]
    async fn test_missing_set_shrinks_every_round_until_empty() {
        let mut fx = fixture();
        // a season fails as soon as its first month exhausts five attempts
        let api = Arc::new(
            SeasonApi::new(60)
                .failing_first("S1", 5)
                .failing_first("S2", 10),
        );
        let scheduler = AcquisitionScheduler::new(aggregator(api.clone()), fx.store.clone(), 10);
        let mut pool = TokioJobPool::new(4);

        let report = scheduler
            .run(2024, &mut fx.catalog, &mut pool, &AlwaysRetry)
            .await
            .unwrap();

        assert_eq!(report.pending_per_round(), [3, 2, 1]);
        assert_eq!(report.rounds[0].failures().len(), 2);
        assert_eq!(report.succeeded(), ["H1", "S1", "S2"]);
        assert!(report.excluded().is_empty());
        assert!(scheduler.missing(&fx.catalog).is_empty());

        assert!(fx.store.exists("H1", Artifact::Season));
        assert!(fx.store.exists("H1", Artifact::Velocity));
        assert!(fx.store.exists("S1", Artifact::Season));
        assert!(!fx.store.exists("S1", Artifact::Velocity));
        assert_eq!(api.calls("W1"), 0);
        assert_eq!(api.calls("H1"), 16);
    }

    #[tokio::test]
    async fn test_failed_season_writes_nothing_and_can_be_excluded() {
        let mut fx = fixture();
        let broken = MonthWindow::season(2024)[6];
        let api = Arc::new(SeasonApi::new(60).broken_month("S2", broken));
        let scheduler = AcquisitionScheduler::new(aggregator(api.clone()), fx.store.clone(), 10);
        let mut inline = InlineExecutor::new();

        let report = scheduler
            .run(2024, &mut fx.catalog, &mut inline, &AlwaysExclude)
            .await
            .unwrap();

        assert_eq!(report.rounds_run(), 1);
        assert_eq!(report.excluded(), ["S2"]);
        // the excluded station still shows up in the round's failure report
        let failures = report.rounds[0].failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].station, "S2");
        assert_eq!(failures[0].kind, ErrorKind::SeasonIncomplete);
        assert!(failures[0].reason.contains("S2"));
        assert!(fx.catalog.is_excluded("S2"));
        assert!(!fx.store.exists("S2", Artifact::Season));
        assert!(!fx.store.station_dir("S2").exists());
        assert_eq!(api.calls("S2"), 6 + 5);

        // the exclusion survives a reload of the catalog
        let reloaded = StationCatalog::load(fx.catalog.path()).await.unwrap();
        assert!(reloaded.is_excluded("S2"));
    }

    #[tokio::test]
    async fn test_persistent_failure_is_retried_then_excluded() {
        let mut fx = fixture();
        let api = Arc::new(SeasonApi::new(60).broken_month("H1", MonthWindow::season(2024)[0]));
        let scheduler = AcquisitionScheduler::new(aggregator(api.clone()), fx.store.clone(), 10);
        let mut pool = TokioJobPool::new(2);
        let kinds = std::sync::Mutex::new(Vec::new());
        let decider = ExcludeAfterRounds::new(2);
        let recording = |id: &str, kind: ErrorKind| {
            kinds.lock().unwrap().push((id.to_string(), kind));
            Decision::Retry
        };

        // one round with a closure that only records
        let first = scheduler
            .run_round(
                1,
                2024,
                scheduler.missing(&fx.catalog),
                &mut fx.catalog,
                &mut pool,
                &recording,
            )
            .await
            .unwrap();
        assert_eq!(
            kinds.lock().unwrap().as_slice(),
            [("H1".to_string(), ErrorKind::SeasonIncomplete)]
        );
        let failures = first.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, ErrorKind::SeasonIncomplete);
        assert_eq!(first.succeeded().collect::<Vec<_>>(), ["S1", "S2"]);
        assert!(!fx.catalog.is_excluded("H1"));

        let report = scheduler
            .run(2024, &mut fx.catalog, &mut pool, &decider)
            .await
            .unwrap();
        assert_eq!(report.pending_per_round(), [1, 1]);
        assert_eq!(report.excluded(), ["H1"]);
        assert!(scheduler.missing(&fx.catalog).is_empty());
    }

    #[tokio::test]
    async fn test_existing_output_is_not_fetched_again() {
        let mut fx = fixture();
        let api = Arc::new(SeasonApi::new(60));
        let scheduler = AcquisitionScheduler::new(aggregator(api.clone()), fx.store.clone(), 10);
        let mut pool = TokioJobPool::new(4);
        scheduler
            .run(2024, &mut fx.catalog, &mut pool, &AlwaysRetry)
            .await
            .unwrap();
        let report = scheduler
            .run(2024, &mut fx.catalog, &mut pool, &AlwaysRetry)
            .await
            .unwrap();
        assert_eq!(report.rounds_run(), 0);
        assert_eq!(api.calls("S1"), 16);
    }
}
