use crate::predictions::error::SeasonError;
use crate::predictions::month_fetcher::MonthFetcher;
use crate::types::month_window::{MonthWindow, SEASON_MONTHS};
use crate::types::series::SeasonSeries;
use crate::types::station::Station;
use log::info;
use std::sync::Arc;

/// Acquires the 16-month season for a station, month by month, all or nothing.
#[derive(Clone)]
pub struct SeasonAggregator {
    fetcher: Arc<MonthFetcher>,
}

impl SeasonAggregator {
    pub fn new(fetcher: Arc<MonthFetcher>) -> Self {
        Self { fetcher }
    }

    /// Months are fetched in chronological order and the first failing month aborts
    /// the season; nothing partial is ever returned.
    pub async fn acquire(&self, year: i32, station: &Station) -> Result<SeasonSeries, SeasonError> {
        let mut months = Vec::with_capacity(SEASON_MONTHS);
        for window in MonthWindow::season(year) {
            let month = self.fetcher.fetch(window, station).await.map_err(|e| {
                SeasonError::Incomplete {
                    station: station.id.clone(),
                    window,
                    source: e,
                }
            })?;
            months.push(month);
        }

        let season = SeasonSeries::concat(months).map_err(|e| SeasonError::Invalid {
            station: station.id.clone(),
            source: e,
        })?;
        info!(
            "Acquired {} samples for station {} season {}",
            season.len(),
            station.label(),
            year
        );
        Ok(season)
    }
}
