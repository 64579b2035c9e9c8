//! The canonical table layout shared by every persisted series: `Time` (UTC text),
//! `stamp` (epoch seconds) and `Velocity_Major`.

use crate::types::series::RawSample;
use chrono::DateTime;
use polars::prelude::*;

pub const TIME_COLUMN: &str = "Time";
pub const STAMP_COLUMN: &str = "stamp";
pub const VELOCITY_COLUMN: &str = "Velocity_Major";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn samples_to_frame(samples: &[RawSample]) -> PolarsResult<DataFrame> {
    let times: Vec<String> = samples
        .iter()
        .map(|s| s.time.format(TIME_FORMAT).to_string())
        .collect();
    let stamps: Vec<i64> = samples.iter().map(RawSample::stamp).collect();
    let velocities: Vec<f64> = samples.iter().map(|s| s.velocity).collect();

    df!(
        TIME_COLUMN => times,
        STAMP_COLUMN => stamps,
        VELOCITY_COLUMN => velocities
    )
}

/// Reads samples back from a canonical frame. `stamp` is authoritative for time.
pub fn frame_to_samples(df: &DataFrame) -> Result<Vec<RawSample>, String> {
    let stamps = df
        .column(STAMP_COLUMN)
        .and_then(|c| c.as_materialized_series().cast(&DataType::Int64))
        .map_err(|e| e.to_string())?;
    let velocities = df
        .column(VELOCITY_COLUMN)
        .and_then(|c| c.as_materialized_series().cast(&DataType::Float64))
        .map_err(|e| e.to_string())?;
    let stamps = stamps.i64().map_err(|e| e.to_string())?;
    let velocities = velocities.f64().map_err(|e| e.to_string())?;

    stamps
        .into_iter()
        .zip(velocities)
        .enumerate()
        .map(|(row, (stamp, velocity))| {
            let time = stamp
                .and_then(|s| DateTime::from_timestamp(s, 0))
                .ok_or_else(|| format!("row {} has no valid stamp", row))?;
            Ok(RawSample::new(time, velocity.unwrap_or(f64::NAN)))
        })
        .collect()
}
