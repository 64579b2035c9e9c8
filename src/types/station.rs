//! Defines the data structures representing current-prediction stations and their metadata,
//! including the station category that decides how (and whether) a station's data is
//! acquired and resampled.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- Data Structures ---

/// Represents a single current-prediction station.
///
/// Stations are loaded once from the catalog and never change afterwards; the only
/// mutable per-station fact (whether the operator excluded it) lives in
/// [`crate::StationCatalog`], not here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    /// The unique station identifier (e.g., "ACT0091").
    pub id: String,
    /// Human readable station name.
    pub name: String,
    /// The prediction category published for this station.
    pub category: StationCategory,
    /// Geographical location of the station.
    pub location: Location,
    /// The representative depth bin (the shallowest one published), if the station has bins.
    pub bin: Option<u32>,
}

impl Station {
    /// Name used in log lines and operator prompts: `"<id> <name>"`.
    pub fn label(&self) -> String {
        format!("{} {}", self.id, self.name)
    }
}

/// The prediction category of a station.
///
/// The category decides the fate of a station in the pipeline:
/// harmonic stations are fetched and used as-is, subordinate stations are fetched
/// and then spline-resampled, weak & variable stations are catalog-only.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationCategory {
    /// Publishes directly usable dense predictions.
    #[serde(rename = "H")]
    Harmonic,
    /// Publishes sparse harmonic-fit samples that need resampling.
    #[serde(rename = "S")]
    Subordinate,
    /// Weak and variable currents; never fetched or processed.
    #[serde(rename = "W")]
    Weak,
}

impl StationCategory {
    /// The single-letter code used by the metadata API.
    pub fn code(&self) -> &'static str {
        match self {
            StationCategory::Harmonic => "H",
            StationCategory::Subordinate => "S",
            StationCategory::Weak => "W",
        }
    }

    /// Whether season data has to be downloaded for this category.
    pub fn requires_data(&self) -> bool {
        !matches!(self, StationCategory::Weak)
    }

    /// Whether the downloaded season has to be resampled to one-minute resolution.
    pub fn needs_resampling(&self) -> bool {
        matches!(self, StationCategory::Subordinate)
    }
}

impl fmt::Display for StationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for StationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "H" => Ok(StationCategory::Harmonic),
            "S" => Ok(StationCategory::Subordinate),
            "W" => Ok(StationCategory::Weak),
            other => Err(format!("unknown station category '{}'", other)),
        }
    }
}

/// Represents the geographical location of a station.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees (positive for North, negative for South).
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East, negative for West).
    pub longitude: f64,
}

/// A measurement depth published for a station.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct DepthBin {
    /// The bin number used in prediction requests.
    pub number: u32,
    /// Depth below the surface, if the metadata reports one.
    pub depth: Option<f64>,
}

/// Picks the shallowest bin. Bins without a depth sort last, ties go to the lowest bin number.
pub fn shallowest_bin(bins: &[DepthBin]) -> Option<u32> {
    bins.iter()
        .min_by(|a, b| {
            let a_depth = a.depth.unwrap_or(f64::INFINITY);
            let b_depth = b.depth.unwrap_or(f64::INFINITY);
            a_depth
                .total_cmp(&b_depth)
                .then_with(|| a.number.cmp(&b.number))
        })
        .map(|bin| bin.number)
}
