use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::api::ApiError;

/// Errors that can occur while exporting a report
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Download failed: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid export file name: {0}")]
    InvalidName(String),
}

/// File name a downloaded report is saved under
pub fn report_filename(report_id: i64) -> String {
    format!("security_report_{}.json", report_id)
}

/// Destination for downloaded blobs
pub trait FileSaver: Send + Sync {
    /// Persist `contents` as `filename`, returning where it ended up
    fn save(&self, contents: &[u8], filename: &str) -> Result<PathBuf, ExportError>;
}

/// Saves into a fixed directory on the local disk
#[derive(Debug, Clone)]
pub struct DiskFileSaver {
    directory: PathBuf,
}

impl DiskFileSaver {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        DiskFileSaver {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl FileSaver for DiskFileSaver {
    fn save(&self, contents: &[u8], filename: &str) -> Result<PathBuf, ExportError> {
        // Only bare file names; nothing may escape the export directory
        let name = Path::new(filename);
        if filename.is_empty() || name.file_name().map(|n| n != name.as_os_str()).unwrap_or(true) {
            return Err(ExportError::InvalidName(filename.to_string()));
        }

        std::fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(contents)?;
        writer.flush()?;

        log::info!("Saved {} bytes to {:?}", contents.len(), path);
        Ok(path)
    }
}
