use crate::storage::error::StorageError;
use crate::storage::frame::{frame_to_samples, samples_to_frame};
use crate::types::series::{DenseSeries, RawSample, SeasonSeries};
use log::debug;
use polars::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;

/// File format of persisted tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

/// The per-station files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// The downloaded season, exactly as fetched.
    Season,
    /// The series handed to consumers: dense for subordinate stations, a copy for harmonic ones.
    Velocity,
}

impl Artifact {
    fn file_stem(&self) -> &'static str {
        match self {
            Artifact::Season => "season",
            Artifact::Velocity => "velocity",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// One folder per station under a per-year root.
///
/// Tables are written to a temporary file in the station folder and renamed into
/// place, so an artifact that exists is always complete.
#[derive(Debug, Clone)]
pub struct StationStore {
    root: PathBuf,
    format: TableFormat,
}

impl StationStore {
    pub fn new(root: impl Into<PathBuf>, format: TableFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// Store for one target year: `<data_dir>/<year>/<station>/`.
    pub fn for_year(data_dir: &Path, year: i32, format: TableFormat) -> Self {
        Self::new(data_dir.join(year.to_string()), format)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn station_dir(&self, station: &str) -> PathBuf {
        self.root.join(station)
    }

    pub fn path(&self, station: &str, artifact: Artifact) -> PathBuf {
        self.station_dir(station)
            .join(format!("{}.{}", artifact.file_stem(), self.format.extension()))
    }

    pub fn exists(&self, station: &str, artifact: Artifact) -> bool {
        self.path(station, artifact).is_file()
    }

    pub async fn write_season(
        &self,
        station: &str,
        season: &SeasonSeries,
    ) -> Result<PathBuf, StorageError> {
        self.write_samples(station, Artifact::Season, season.samples().to_vec())
            .await
    }

    pub async fn write_dense(
        &self,
        station: &str,
        dense: &DenseSeries,
    ) -> Result<PathBuf, StorageError> {
        self.write_samples(station, Artifact::Velocity, dense.iter().collect())
            .await
    }

    pub async fn write_samples(
        &self,
        station: &str,
        artifact: Artifact,
        samples: Vec<RawSample>,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.station_dir(station);
        let path = self.path(station, artifact);
        let format = self.format;
        let rows = samples.len();

        let written = task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| StorageError::DirCreation(dir.clone(), e))?;
            let mut df = samples_to_frame(&samples)
                .map_err(|e| StorageError::WritePolars(path.clone(), e))?;

            let mut temp_file = NamedTempFile::new_in(&dir)
                .map_err(|e| StorageError::WriteIo(path.clone(), e))?;
            match format {
                TableFormat::Csv => CsvWriter::new(temp_file.as_file_mut())
                    .include_header(true)
                    .finish(&mut df),
                TableFormat::Parquet => ParquetWriter::new(temp_file.as_file_mut())
                    .with_compression(ParquetCompression::Snappy)
                    .finish(&mut df)
                    .map(|_| ()),
            }
            .map_err(|e| StorageError::WritePolars(path.clone(), e))?;

            temp_file
                .persist(&path)
                .map_err(|e| StorageError::WriteIo(path.clone(), e.error))?;
            Ok::<PathBuf, StorageError>(path)
        })
        .await??;

        debug!("Wrote {} rows to {:?}", rows, written);
        Ok(written)
    }

    /// Reads the stored season back without validating it.
    pub async fn read_season(&self, station: &str) -> Result<SeasonSeries, StorageError> {
        let samples = self.read_samples(station, Artifact::Season).await?;
        Ok(SeasonSeries::from_samples(samples))
    }

    pub async fn read_samples(
        &self,
        station: &str,
        artifact: Artifact,
    ) -> Result<Vec<RawSample>, StorageError> {
        let path = self.path(station, artifact);
        let format = self.format;

        task::spawn_blocking(move || {
            let df = match format {
                TableFormat::Csv => CsvReadOptions::default()
                    .with_has_header(true)
                    .try_into_reader_with_file_path(Some(path.clone()))
                    .and_then(|reader| reader.finish()),
                TableFormat::Parquet => {
                    let file = std::fs::File::open(&path)
                        .map_err(|e| StorageError::ReadIo(path.clone(), e))?;
                    ParquetReader::new(file).finish()
                }
            }
            .map_err(|e| StorageError::ReadPolars(path.clone(), e))?;

            frame_to_samples(&df).map_err(|message| StorageError::Content { path, message })
        })
        .await?
    }

    /// Removes an artifact; returns whether it existed.
    pub async fn remove(&self, station: &str, artifact: Artifact) -> Result<bool, StorageError> {
        let path = self.path(station, artifact);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Remove(path, e)),
        }
    }
}
