//! Velocity series at the three stages of the pipeline: one month as fetched, a full
//! season as concatenated, and the dense one-minute series produced by resampling.

use crate::types::month_window::MonthWindow;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Series for {0} has no usable velocity values")]
    Empty(MonthWindow),

    #[error("Timestamps are not increasing at row {index}: {previous} followed by {current}")]
    NonMonotonic {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("Duplicate timestamp {time} at row {index}")]
    DuplicateTimestamp { index: usize, time: DateTime<Utc> },

    #[error("At least 2 samples are needed to fit a spline, found {found}")]
    InsufficientPoints { found: usize },

    #[error("Spline system could not be solved at knot {knot}")]
    IllConditioned { knot: usize },
}

/// A single `(timestamp, velocity)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub time: DateTime<Utc>,
    pub velocity: f64,
}

impl RawSample {
    pub fn new(time: DateTime<Utc>, velocity: f64) -> Self {
        Self { time, velocity }
    }

    /// Seconds since the Unix epoch, the `stamp` column of persisted tables.
    pub fn stamp(&self) -> i64 {
        self.time.timestamp()
    }
}

/// The samples of one calendar month. Never empty and never all-NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSeries {
    window: MonthWindow,
    samples: Vec<RawSample>,
}

impl MonthSeries {
    pub fn new(window: MonthWindow, samples: Vec<RawSample>) -> Result<Self, SeriesError> {
        if samples.iter().all(|s| s.velocity.is_nan()) {
            return Err(SeriesError::Empty(window));
        }
        Ok(Self { window, samples })
    }

    pub fn window(&self) -> MonthWindow {
        self.window
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A full season of samples.
///
/// Series built from fetched months are validated on concatenation. Series read back
/// from storage are wrapped unchecked with [`SeasonSeries::from_samples`] so that the
/// resampler reports any corruption itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonSeries {
    samples: Vec<RawSample>,
}

impl SeasonSeries {
    /// Concatenates months in the order given and checks the strictly increasing invariant.
    pub fn concat(months: Vec<MonthSeries>) -> Result<Self, SeriesError> {
        let total = months.iter().map(MonthSeries::len).sum();
        let mut samples = Vec::with_capacity(total);
        for month in months {
            samples.extend(month.samples);
        }
        let series = Self { samples };
        series.validate()?;
        Ok(series)
    }

    /// Wraps samples without validating them.
    pub fn from_samples(samples: Vec<RawSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&RawSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&RawSample> {
        self.samples.last()
    }

    /// Rejects repeated timestamps anywhere in the series, then any decreasing step.
    pub fn validate(&self) -> Result<(), SeriesError> {
        let mut seen = HashSet::with_capacity(self.samples.len());
        for (index, sample) in self.samples.iter().enumerate() {
            if !seen.insert(sample.time) {
                return Err(SeriesError::DuplicateTimestamp {
                    index,
                    time: sample.time,
                });
            }
        }
        for (index, pair) in self.samples.windows(2).enumerate() {
            if pair[1].time <= pair[0].time {
                return Err(SeriesError::NonMonotonic {
                    index: index + 1,
                    previous: pair[0].time,
                    current: pair[1].time,
                });
            }
        }
        Ok(())
    }
}

/// Velocities at exactly one-minute spacing over whole UTC days.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseSeries {
    start: DateTime<Utc>,
    velocities: Vec<f64>,
}

impl DenseSeries {
    pub(crate) fn new(start: DateTime<Utc>, velocities: Vec<f64>) -> Self {
        Self { start, velocities }
    }

    /// Midnight of the first covered day (inclusive).
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Midnight after the last covered day (exclusive).
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(self.velocities.len() as i64)
    }

    pub fn len(&self) -> usize {
        self.velocities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocities.is_empty()
    }

    pub fn velocities(&self) -> &[f64] {
        &self.velocities
    }

    pub fn time_at(&self, index: usize) -> DateTime<Utc> {
        self.start + Duration::minutes(index as i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = RawSample> + '_ {
        self.velocities
            .iter()
            .enumerate()
            .map(|(i, &velocity)| RawSample::new(self.time_at(i), velocity))
    }

    /// Re-wraps the grid as a season series, e.g. to resample it again.
    pub fn to_season(&self) -> SeasonSeries {
        SeasonSeries::from_samples(self.iter().collect())
    }
}
