use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::api::{AnalysisApi, ApiError};
use crate::models::FileId;
use crate::notifications::NotificationScheduler;

/// Largest log file the service accepts
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Extensions the service can parse
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "log", "txt"];

/// Errors that can occur while uploading a log file
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file type: {0} (expected .csv, .log or .txt)")]
    UnsupportedExtension(String),

    #[error("File is too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Api(#[from] ApiError),
}

/// Check that `path` names a readable log file the service will take.
/// Returns the file size.
pub fn validate_log_file(path: &Path) -> Result<u64, UploadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadError::UnsupportedExtension(path.display().to_string()));
    }

    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(UploadError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )));
    }
    if metadata.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size: metadata.len(),
            limit: MAX_UPLOAD_BYTES,
        });
    }

    Ok(metadata.len())
}

/// Sends log files to the service
#[derive(Clone)]
pub struct Uploader {
    api: Arc<dyn AnalysisApi>,
    notifier: NotificationScheduler,
}

impl Uploader {
    pub fn new(api: Arc<dyn AnalysisApi>, notifier: NotificationScheduler) -> Self {
        Uploader { api, notifier }
    }

    /// Validate and upload `path`. Returns the id the service assigned, or
    /// `None` after notifying the operator of the failure.
    pub async fn upload(&self, path: &Path) -> Option<FileId> {
        match self.try_upload(path).await {
            Ok((file_id, lines)) => {
                self.notifier.success(
                    "Upload complete",
                    format!("File uploaded ({} lines)", lines),
                );
                Some(file_id)
            }
            Err(e) => {
                log::error!("Upload of {:?} failed: {}", path, e);
                let message = match &e {
                    UploadError::Api(api) => api.detail().unwrap_or("Upload failed").to_string(),
                    other => other.to_string(),
                };
                self.notifier.error("Upload failed", message);
                None
            }
        }
    }

    async fn try_upload(&self, path: &Path) -> Result<(FileId, u64), UploadError> {
        validate_log_file(path)?;
        let contents = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.log".to_string());

        let receipt = self.api.upload(&filename, contents).await?;
        log::info!(
            "Uploaded {} as file {} ({} bytes, {} lines)",
            receipt.filename,
            receipt.file_id,
            receipt.file_size,
            receipt.total_lines
        );
        Ok((receipt.file_id, receipt.total_lines))
    }
}
