use crate::jobs::{Job, JobError, JobExecutor};
use crate::schedule::error::ResampleError;
use crate::schedule::state::{ResampleReport, StationFailure};
use crate::spline::resampler::SplineResampler;
use crate::stations::catalog::StationCatalog;
use crate::storage::store::{Artifact, StationStore};
use crate::types::station::Station;
use futures_util::FutureExt;
use log::{info, warn};

/// Number of rows in the written dense series.
pub type ResampleOutcome = Result<usize, ResampleError>;

/// Resamples every subordinate station that has a stored season but no velocity
/// series yet. A single pass: failures are reported, never requeued.
pub struct ResamplingScheduler {
    store: StationStore,
    resampler: SplineResampler,
    keep_raw: bool,
}

impl ResamplingScheduler {
    pub fn new(store: StationStore, keep_raw: bool) -> Self {
        Self {
            store,
            resampler: SplineResampler::new(),
            keep_raw,
        }
    }

    pub fn eligible(&self, catalog: &StationCatalog) -> Vec<Station> {
        catalog
            .active()
            .filter(|s| s.category.needs_resampling())
            .filter(|s| self.store.exists(&s.id, Artifact::Season))
            .filter(|s| !self.store.exists(&s.id, Artifact::Velocity))
            .cloned()
            .collect()
    }

    pub async fn run(
        &self,
        catalog: &StationCatalog,
        executor: &mut dyn JobExecutor<ResampleOutcome>,
    ) -> ResampleReport {
        let stations = self.eligible(catalog);
        info!("Resampling {} station(s)", stations.len());

        let submitted: Vec<_> = stations
            .into_iter()
            .map(|station| {
                let handle = executor.submit(self.job(station.clone()));
                (station, handle)
            })
            .collect();
        executor.wait_all().await;

        let mut report = ResampleReport::default();
        for (station, handle) in submitted {
            let outcome = executor.result(handle).unwrap_or_else(|e| {
                Err(ResampleError::Job {
                    station: station.id.clone(),
                    source: e,
                })
            });
            match outcome {
                Ok(rows) => {
                    info!("Resampled station {} to {} rows", station.label(), rows);
                    report.succeeded.push(station.id);
                }
                Err(error) => {
                    warn!(
                        "Resampling failed for station {} ({:?}): {}",
                        station.label(),
                        error.kind(),
                        error
                    );
                    report.failures.push(StationFailure {
                        station: station.id,
                        kind: error.kind(),
                        reason: error.to_string(),
                    });
                }
            }
        }
        report
    }

    fn job(&self, station: Station) -> Job<ResampleOutcome> {
        let store = self.store.clone();
        let resampler = self.resampler;
        let keep_raw = self.keep_raw;
        async move {
            let id = station.id;
            let storage = |source| ResampleError::Storage {
                station: id.clone(),
                source,
            };

            let season = store.read_season(&id).await.map_err(storage)?;
            let dense = tokio::task::spawn_blocking(move || resampler.resample(&season))
                .await
                .map_err(|e| ResampleError::Job {
                    station: id.clone(),
                    source: JobError::from(e),
                })?
                .map_err(|source| ResampleError::Series {
                    station: id.clone(),
                    source,
                })?;

            store.write_dense(&id, &dense).await.map_err(storage)?;
            if !keep_raw {
                store
                    .remove(&id, Artifact::Season)
                    .await
                    .map_err(storage)?;
            }
            Ok::<usize, ResampleError>(dense.len())
        }
        .boxed()
    }
}
