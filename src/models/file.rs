use serde::{Deserialize, Serialize};

use super::FileId;

/// Metadata the service keeps for an uploaded log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFile {
    pub id: FileId,
    pub filename: String,
    #[serde(default)]
    pub total_lines: u64,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub is_analyzed: bool,
}

/// Acknowledgement returned after a successful upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub file_id: FileId,
    pub filename: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub total_lines: u64,
}
