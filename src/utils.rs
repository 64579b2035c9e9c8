use crate::error::PipelineError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "tidal_currents";

pub fn default_data_dir() -> Result<PathBuf, PipelineError> {
    dirs::data_dir()
        .ok_or(PipelineError::DataDirResolution)
        .map(|p| p.join(DATA_DIR_NAME))
}

pub async fn ensure_dir_exists(path: &Path) -> Result<(), PipelineError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(PipelineError::DataDirNotADirectory(path.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating data directory: {}", path.display());
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| PipelineError::DataDirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(PipelineError::DataDirCreation(path.to_path_buf(), e)),
    }
}
