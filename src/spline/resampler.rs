use crate::spline::cubic::CubicSpline;
use crate::types::series::{DenseSeries, SeasonSeries, SeriesError};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::debug;

/// Resamples a sparse season series to one velocity per minute over whole UTC days.
///
/// The grid starts at midnight of the first sample's date and stops before midnight of
/// the day after the last sample's date. Every grid value is rounded to two decimals, so
/// resampling an already dense series reproduces it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplineResampler;

impl SplineResampler {
    pub fn new() -> Self {
        Self
    }

    pub fn resample(&self, series: &SeasonSeries) -> Result<DenseSeries, SeriesError> {
        series.validate()?;
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Err(SeriesError::InsufficientPoints { found: 0 });
        };

        // Knots are seconds from the first sample to keep the system well scaled.
        let origin = first.time;
        let xs: Vec<f64> = series
            .samples()
            .iter()
            .map(|s| seconds_between(origin, s.time))
            .collect();
        let ys: Vec<f64> = series.samples().iter().map(|s| s.velocity).collect();
        let spline = CubicSpline::not_a_knot(&xs, &ys)?;

        let start = midnight(first.time.date_naive());
        let end = midnight(last.time.date_naive() + Duration::days(1));
        let count = (end - start).num_minutes();
        debug!(
            "Resampling {} samples onto {} minutes from {} to {}",
            series.len(),
            count,
            start,
            end
        );

        let offset = seconds_between(origin, start);
        let grid = (0..count).map(|minute| offset + (minute * 60) as f64);
        let velocities = spline
            .evaluate_sorted(grid)
            .into_iter()
            .map(round_to_hundredths)
            .collect();

        Ok(DenseSeries::new(start, velocities))
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn seconds_between(origin: DateTime<Utc>, time: DateTime<Utc>) -> f64 {
    (time - origin).num_seconds() as f64
}

/// Halves go to the even hundredth.
fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::series::RawSample;
    use chrono::TimeZone;

    fn tidal(time: DateTime<Utc>) -> f64 {
        let hours = time.timestamp() as f64 / 3600.0;
        2.1 * (2.0 * std::f64::consts::PI * hours / 12.42).sin()
    }

    /// Max/slack style samples: roughly every three hours, starting mid-morning.
    fn sparse_series() -> SeasonSeries {
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 9, 17, 0).unwrap();
        let samples = (0..40)
            .map(|i| {
                let time = first + Duration::minutes(i * 187);
                RawSample::new(time, tidal(time))
            })
            .collect();
        SeasonSeries::from_samples(samples)
    }

    #[test]
    fn test_grid_is_midnight_aligned() {
        let series = sparse_series();
        let dense = SplineResampler::new().resample(&series).unwrap();

        let last_date = series.last().unwrap().time.date_naive();
        assert_eq!(dense.start(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(dense.end(), midnight(last_date + Duration::days(1)));
        assert_eq!(
            dense.len() as i64,
            (dense.end() - dense.start()).num_minutes()
        );
        assert_eq!(dense.len() % 1440, 0);
    }

    #[test]
    fn test_values_are_rounded_and_match_knots() {
        let series = sparse_series();
        let dense = SplineResampler::new().resample(&series).unwrap();

        for value in dense.velocities() {
            assert!(((value * 100.0).round() - value * 100.0).abs() < 1e-6);
        }
        for sample in series.samples() {
            let index = (sample.time - dense.start()).num_minutes() as usize;
            assert!((dense.velocities()[index] - sample.velocity).abs() <= 0.005 + 1e-9);
        }
    }

    #[test]
    fn test_halves_round_to_even() {
        assert_eq!(round_to_hundredths(0.125), 0.12);
        assert_eq!(round_to_hundredths(0.375), 0.38);
        assert_eq!(round_to_hundredths(-0.125), -0.12);
        assert_eq!(round_to_hundredths(1.2345), 1.23);
    }

    #[test]
    fn test_resampling_is_idempotent() {
        let resampler = SplineResampler::new();
        let once = resampler.resample(&sparse_series()).unwrap();
        let twice = resampler.resample(&once.to_season()).unwrap();

        assert_eq!(once.start(), twice.start());
        assert_eq!(once.end(), twice.end());
        for (a, b) in once.velocities().iter().zip(twice.velocities()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rejects_disordered_input_before_fitting() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let backwards = SeasonSeries::from_samples(vec![
            RawSample::new(t0, 0.0),
            RawSample::new(t0 + Duration::hours(2), 1.0),
            RawSample::new(t0 + Duration::hours(1), 0.5),
        ]);
        assert!(matches!(
            SplineResampler::new().resample(&backwards),
            Err(SeriesError::NonMonotonic { .. })
        ));

        let repeated = SeasonSeries::from_samples(vec![
            RawSample::new(t0, 0.0),
            RawSample::new(t0, 1.0),
        ]);
        assert!(matches!(
            SplineResampler::new().resample(&repeated),
            Err(SeriesError::DuplicateTimestamp { .. })
        ));
    }

    #[test]
    fn test_empty_series_is_rejected() {
        assert_eq!(
            SplineResampler::new().resample(&SeasonSeries::from_samples(vec![])),
            Err(SeriesError::InsufficientPoints { found: 0 })
        );
    }
}
