//! Turns a month payload into samples.
//!
//! The endpoint's CSV headers vary with interval and product version (`Time`,
//! `Date Time`, `Date_Time (LST/LDT)` for time; `Velocity_Major`, `Speed (knots)` for
//! velocity, usually with a leading space). Headers are renamed to the canonical
//! [`TIME_COLUMN`] / [`VELOCITY_COLUMN`] before values are read.

use crate::predictions::error::FetchError;
use crate::storage::frame::{TIME_COLUMN, VELOCITY_COLUMN};
use crate::types::month_window::MonthWindow;
use crate::types::series::RawSample;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use polars::prelude::*;
use std::io::Cursor;

const UNAVAILABLE_MARKERS: [&str; 3] = [
    "predictions not available",
    "no predictions data was found",
    "not a valid current station",
];

const NAIVE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Whether the body is the endpoint's "no predictions for this station" answer.
pub fn is_unavailable(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    UNAVAILABLE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Parses a CSV payload into samples inside `window`.
///
/// Rows whose velocity is missing are dropped; samples outside the month are dropped so
/// that adjacent months never overlap. An empty result is [`FetchError::Empty`].
pub fn parse_month_table(
    body: &str,
    station: &str,
    window: MonthWindow,
) -> Result<Vec<RawSample>, FetchError> {
    let empty = || FetchError::Empty {
        station: station.to_string(),
        window,
    };
    let malformed = |detail: String| FetchError::Malformed {
        station: station.to_string(),
        window,
        detail,
    };

    if body.lines().filter(|line| !line.trim().is_empty()).count() < 2 {
        return Err(empty());
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(body.as_bytes().to_vec()))
        .finish()
        .map_err(|e| malformed(e.to_string()))?;

    if df.height() == 0 {
        return Err(empty());
    }

    normalize_columns(&mut df).map_err(malformed)?;
    let samples = extract_samples(&df).map_err(malformed)?;
    let parsed = samples.len();

    let samples: Vec<RawSample> = samples
        .into_iter()
        .filter(|s| window.contains(s.time.date_naive()))
        .filter(|s| !s.velocity.is_nan())
        .collect();
    if samples.len() != parsed {
        debug!(
            "Dropped {} of {} rows for station {} in {}",
            parsed - samples.len(),
            parsed,
            station,
            window
        );
    }

    if samples.is_empty() {
        return Err(empty());
    }
    Ok(samples)
}

/// Renames the first time-like and velocity-like headers to the canonical names.
fn normalize_columns(df: &mut DataFrame) -> Result<(), String> {
    let names: Vec<String> = df
        .get_columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let time = names
        .iter()
        .find(|name| is_time_header(name))
        .cloned()
        .ok_or_else(|| format!("no time column among {:?}", names))?;
    let velocity = names
        .iter()
        .find(|name| is_velocity_header(name))
        .cloned()
        .ok_or_else(|| format!("no velocity column among {:?}", names))?;

    for (current, canonical) in [(time, TIME_COLUMN), (velocity, VELOCITY_COLUMN)] {
        if current != canonical {
            df.rename(&current, canonical.into())
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

fn is_time_header(name: &str) -> bool {
    let name = name.trim().to_ascii_lowercase();
    name == "time" || name.starts_with("date") || name == "t"
}

fn is_velocity_header(name: &str) -> bool {
    let name = name.trim().to_ascii_lowercase();
    name == "velocity_major" || name.starts_with("speed") || name == "v"
}

fn extract_samples(df: &DataFrame) -> Result<Vec<RawSample>, String> {
    // Values often carry the same padding as the headers, so both columns are read as
    // text and trimmed rather than trusting the inferred dtype.
    let times = string_column(df, TIME_COLUMN)?;
    let velocities = string_column(df, VELOCITY_COLUMN)?;
    let times = times.str().map_err(|e| e.to_string())?;
    let velocities = velocities.str().map_err(|e| e.to_string())?;

    times
        .into_iter()
        .zip(velocities)
        .map(|(time, velocity)| {
            let time = time.ok_or_else(|| "missing timestamp".to_string())?;
            let velocity = velocity
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(f64::NAN);
            Ok(RawSample::new(parse_time(time)?, velocity))
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str) -> Result<Series, String> {
    df.column(name)
        .and_then(|c| c.as_materialized_series().cast(&DataType::String))
        .map_err(|e| e.to_string())
}

/// Timestamps are requested in GMT, so naive values are taken as UTC.
pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.with_timezone(&Utc));
    }
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("unrecognised timestamp '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> MonthWindow {
        MonthWindow::new(2024, 1).unwrap()
    }

    #[test]
    fn test_parses_six_minute_table() {
        let body = "Time, Depth, Velocity_Major, meanFloodDir, meanEbbDir, Bin\n\
                    2024-01-01 00:00, 12.0, 1.25, 80, 260, 1\n\
                    2024-01-01 00:06, 12.0, 1.31, 80, 260, 1\n\
                    2024-01-01 00:12, 12.0, -0.42, 80, 260, 1\n";
        let samples = parse_month_table(body, "ACT0091", window()).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(
            samples[1].time,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 6, 0).unwrap()
        );
        assert_eq!(samples[2].velocity, -0.42);
    }

    #[test]
    fn test_parses_max_slack_headers() {
        let body = "Date_Time (LST/LDT), Event, Speed (knots)\n\
                    2024-01-03 04:12, slack, 0.0\n\
                    2024-01-03 07:30, flood, 1.9\n";
        let samples = parse_month_table(body, "ACT0091", window()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].velocity, 1.9);
    }

    #[test]
    fn test_drops_rows_outside_window_and_missing_values() {
        let body = "Time, Velocity_Major\n\
                    2023-12-31 23:54, 0.5\n\
                    2024-01-01 00:00,\n\
                    2024-01-01 00:06, 0.7\n\
                    2024-02-01 00:00, 0.9\n";
        let samples = parse_month_table(body, "ACT0091", window()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].velocity, 0.7);
    }

    #[test]
    fn test_header_only_is_empty() {
        let err = parse_month_table("Time, Velocity_Major\n", "ACT0091", window()).unwrap_err();
        assert!(matches!(err, FetchError::Empty { .. }));
        let err = parse_month_table("   ", "ACT0091", window()).unwrap_err();
        assert!(matches!(err, FetchError::Empty { .. }));
    }

    #[test]
    fn test_missing_velocity_column_is_malformed() {
        let body = "Time, Depth\n2024-01-01 00:00, 3.0\n";
        let err = parse_month_table(body, "ACT0091", window()).unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }

    #[test]
    fn test_unavailable_marker_detection() {
        assert!(is_unavailable(
            "Error: No Predictions data was found. Please make sure the station is valid."
        ));
        assert!(is_unavailable("predictions not available for this station"));
        assert!(!is_unavailable("Time, Velocity_Major\n2024-01-01 00:00, 1.0\n"));
    }

    #[test]
    fn test_parse_time_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 6, 30, 0).unwrap();
        assert_eq!(parse_time("2024-01-01 06:30"), Ok(expected));
        assert_eq!(parse_time(" 2024-01-01 06:30:00"), Ok(expected));
        assert_eq!(parse_time("2024-01-01T06:30:00+00:00"), Ok(expected));
        assert!(parse_time("01/01/2024").is_err());
    }
}
