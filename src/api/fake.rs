//! In-memory [`AnalysisApi`] used by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{AnalysisAck, AnalysisApi, ApiError};
use crate::models::{AnalysisResults, FileId, LogFile, Report, SecuritySummary, UploadReceipt};

/// Canned non-2xx answer
#[derive(Debug, Clone)]
pub(crate) struct Failure {
    pub status: u16,
    pub detail: Option<String>,
}

impl Failure {
    pub fn new(status: u16, detail: Option<&str>) -> Self {
        Failure {
            status,
            detail: detail.map(str::to_string),
        }
    }

    fn to_error(&self) -> ApiError {
        ApiError::Status {
            status: StatusCode::from_u16(self.status).unwrap(),
            detail: self.detail.clone(),
        }
    }
}

fn answer<T: Clone>(failure: &Option<Failure>, value: &T) -> Result<T, ApiError> {
    match failure {
        Some(f) => Err(f.to_error()),
        None => Ok(value.clone()),
    }
}

#[derive(Default)]
pub(crate) struct FakeApi {
    pub files: Vec<LogFile>,
    pub files_error: Option<Failure>,
    pub upload_error: Option<Failure>,
    pub summary: SecuritySummary,
    pub analyze_error: Option<Failure>,
    pub analyze_delay: Duration,
    pub results: Option<AnalysisResults>,
    pub results_error: Option<Failure>,
    pub reports: Vec<Report>,
    pub reports_error: Option<Failure>,
    pub report_body: Vec<u8>,
    pub download_error: Option<Failure>,

    pub analyze_calls: AtomicUsize,
    pub results_calls: AtomicUsize,
    pub uploads: Mutex<Vec<(String, usize)>>,
}

impl FakeApi {
    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn results_calls(&self) -> usize {
        self.results_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisApi for FakeApi {
    async fn list_files(&self) -> Result<Vec<LogFile>, ApiError> {
        answer(&self.files_error, &self.files)
    }

    async fn upload(&self, filename: &str, contents: Vec<u8>) -> Result<UploadReceipt, ApiError> {
        if let Some(f) = &self.upload_error {
            return Err(f.to_error());
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((filename.to_string(), contents.len()));
        Ok(UploadReceipt {
            file_id: uploads.len() as FileId,
            filename: filename.to_string(),
            file_size: contents.len() as u64,
            total_lines: contents.iter().filter(|b| **b == b'\n').count() as u64,
        })
    }

    async fn analyze(&self, _file_id: FileId) -> Result<AnalysisAck, ApiError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if !self.analyze_delay.is_zero() {
            tokio::time::sleep(self.analyze_delay).await;
        }
        answer(&self.analyze_error, &self.summary).map(|summary| AnalysisAck { summary })
    }

    async fn results(&self, _file_id: FileId) -> Result<Option<AnalysisResults>, ApiError> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        answer(&self.results_error, &self.results)
    }

    async fn list_reports(&self) -> Result<Vec<Report>, ApiError> {
        answer(&self.reports_error, &self.reports)
    }

    async fn download_report(&self, _report_id: i64) -> Result<Vec<u8>, ApiError> {
        answer(&self.download_error, &self.report_body)
    }
}
