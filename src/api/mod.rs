//! HTTP collaborator for the analysis service
//!
//! The client components talk to the service through the [`AnalysisApi`]
//! trait so they can be driven by an in-memory fake in tests.
//! [`HttpApiClient`] is the production implementation over `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::models::{AnalysisResults, FileId, LogFile, Report, SecuritySummary, UploadReceipt};

#[cfg(test)]
pub(crate) mod fake;

/// Errors that can occur while talking to the analysis service
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned {status}{}", fmt_detail(.detail))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

fn fmt_detail(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

impl ApiError {
    /// Server-supplied explanation, when the service sent one
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Acknowledgement of a finished analysis run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisAck {
    #[serde(default)]
    pub summary: SecuritySummary,
}

/// Operations the client needs from the analysis service
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// List uploaded files with their analysis flag
    async fn list_files(&self) -> Result<Vec<LogFile>, ApiError>;

    /// Upload a log file for later analysis
    async fn upload(&self, filename: &str, contents: Vec<u8>) -> Result<UploadReceipt, ApiError>;

    /// Run the anomaly analysis for a file
    async fn analyze(&self, file_id: FileId) -> Result<AnalysisAck, ApiError>;

    /// Fetch the results of a previous analysis.
    ///
    /// `Ok(None)` means the file has not been analyzed yet.
    async fn results(&self, file_id: FileId) -> Result<Option<AnalysisResults>, ApiError>;

    /// List every security report
    async fn list_reports(&self) -> Result<Vec<Report>, ApiError>;

    /// Download the serialized form of one report
    async fn download_report(&self, report_id: i64) -> Result<Vec<u8>, ApiError>;
}

#[derive(Deserialize)]
struct FilesEnvelope {
    #[serde(default)]
    files: Vec<LogFile>,
}

#[derive(Deserialize)]
struct ReportsEnvelope {
    #[serde(default)]
    reports: Vec<Report>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// `reqwest` implementation of [`AnalysisApi`]
#[derive(Clone)]
pub struct HttpApiClient {
    base_url: String,
    client: Client,
}

impl HttpApiClient {
    /// Create a client for the configured service. Fails when the HTTP
    /// client cannot be built with the configured timeout.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(HttpApiClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Point the client at a different service root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into an [`ApiError::Status`], keeping the
    /// `detail` field of the body when there is one.
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail)
            .map(|d| match d {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });

        log::warn!("Analysis service returned {} ({:?})", status, detail);
        Err(ApiError::Status { status, detail })
    }

    /// Check the status and decode a JSON body
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl AnalysisApi for HttpApiClient {
    async fn list_files(&self) -> Result<Vec<LogFile>, ApiError> {
        let response = self.client.get(self.url("/api/files")).send().await?;
        let envelope: FilesEnvelope = Self::decode(response).await?;
        Ok(envelope.files)
    }

    async fn upload(&self, filename: &str, contents: Vec<u8>) -> Result<UploadReceipt, ApiError> {
        let part = reqwest::multipart::Part::bytes(contents).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn analyze(&self, file_id: FileId) -> Result<AnalysisAck, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/api/analyze/{}", file_id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn results(&self, file_id: FileId) -> Result<Option<AnalysisResults>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/analysis/{}/results", file_id)))
            .send()
            .await?;

        if !response.status().is_success() {
            log::debug!(
                "No results yet for file {} (status {})",
                file_id,
                response.status()
            );
            return Ok(None);
        }

        Self::decode(response).await.map(Some)
    }

    async fn list_reports(&self) -> Result<Vec<Report>, ApiError> {
        let response = self.client.get(self.url("/api/reports")).send().await?;
        let envelope: ReportsEnvelope = Self::decode(response).await?;
        Ok(envelope.reports)
    }

    async fn download_report(&self, report_id: i64) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/reports/{}/download", report_id)))
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
