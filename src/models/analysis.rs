use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the analysis service assigns to an uploaded log file
pub type FileId = i64;

/// Lifecycle of a single analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// One file under analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisJob {
    pub file_id: FileId,
    pub status: JobStatus,
    /// Percentage in [0, 100]
    pub progress: u8,
}

impl AnalysisJob {
    pub fn new(file_id: FileId) -> Self {
        AnalysisJob {
            file_id,
            status: JobStatus::Idle,
            progress: 0,
        }
    }
}

/// Severity label attached to an evaluated log line.
///
/// The set is open: labels the client does not know are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Normal,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Normal => "normal",
            Severity::Other(s) => s,
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        Severity::from(s.as_str())
    }
}

impl From<&str> for Severity {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            "info" => Severity::Info,
            "normal" => Severity::Normal,
            other => Severity::Other(other.to_string()),
        }
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one evaluated log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResultRecord {
    pub line_number: u64,
    #[serde(alias = "log_content")]
    pub content: String,
    pub severity: Severity,
    pub is_anomaly: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub anomaly_probability: f64,
}

/// Counters reported by the analysis service for one job.
///
/// The anomaly rate and the risk level are derived on read and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SecuritySummary {
    #[serde(default)]
    pub total_lines: u64,
    #[serde(default)]
    pub anomaly_count: u64,
    #[serde(default)]
    pub critical_count: u64,
    #[serde(default, deserialize_with = "super::de_risk_score")]
    pub risk_score: Option<u8>,
}

impl SecuritySummary {
    /// Percentage of lines flagged as anomalous, 0 for an empty file
    pub fn anomaly_rate(&self) -> f64 {
        anomaly_rate(self.anomaly_count, self.total_lines)
    }
}

pub(crate) fn anomaly_rate(anomalies: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        anomalies as f64 / total as f64 * 100.0
    }
}

/// Summary plus per-line records fetched for a completed job
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResults {
    #[serde(default)]
    pub summary: Option<SecuritySummary>,
    #[serde(default)]
    pub results: Vec<AnalysisResultRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parsing() {
        assert_eq!(Severity::from("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from("warning"), Severity::Warning);
        assert_eq!(Severity::from("normal"), Severity::Normal);
        assert_eq!(Severity::from("high"), Severity::Other("high".to_string()));
        assert_eq!(Severity::Other("high".to_string()).as_str(), "high");
    }

    #[test]
    fn test_record_deserialization() {
        let json = r#"{
            "line_number": 7,
            "log_content": "Failed password for root",
            "severity": "critical",
            "is_anomaly": true,
            "confidence": 0.91,
            "anomaly_probability": 0.88,
            "explanation": "ignored"
        }"#;
        let record: AnalysisResultRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.line_number, 7);
        assert_eq!(record.content, "Failed password for root");
        assert_eq!(record.severity, Severity::Critical);
        assert!(record.is_anomaly);
    }

    #[test]
    fn test_anomaly_rate() {
        let summary = SecuritySummary {
            total_lines: 1247,
            anomaly_count: 23,
            critical_count: 3,
            risk_score: None,
        };
        assert!((summary.anomaly_rate() - 1.844).abs() < 0.01);
        assert_eq!(SecuritySummary::default().anomaly_rate(), 0.0);
    }

    #[test]
    fn test_summary_ignores_server_rate() {
        let json = r#"{"total_lines": 100, "anomaly_count": 5, "critical_count": 1, "anomaly_rate": 99.0}"#;
        let summary: SecuritySummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.anomaly_rate(), 5.0);
        assert_eq!(summary.risk_score, None);
    }
}
