//! Wire and domain types shared by the client components

pub mod analysis;
pub mod file;
pub mod report;

pub use analysis::{
    AnalysisJob, AnalysisResultRecord, AnalysisResults, FileId, JobStatus, SecuritySummary,
    Severity,
};
pub use file::{LogFile, UploadReceipt};
pub use report::{PotentialAttack, Report, ReportSummary, RiskLevel, SecurityReport};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// The service reports scores as floats with two decimals; the client works
/// with whole points clamped to [0, 100].
pub(crate) fn de_risk_score<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, 100.0) as u8))
}

/// Accepts RFC 3339 timestamps as well as naive ISO timestamps, which are
/// taken to be UTC.
pub(crate) fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Scored {
        #[serde(default, deserialize_with = "de_risk_score")]
        score: Option<u8>,
    }

    #[test]
    fn test_risk_score_rounding_and_clamping() {
        let s: Scored = serde_json::from_str(r#"{"score": 79.6}"#).unwrap();
        assert_eq!(s.score, Some(80));
        let s: Scored = serde_json::from_str(r#"{"score": 140}"#).unwrap();
        assert_eq!(s.score, Some(100));
        let s: Scored = serde_json::from_str(r#"{"score": null}"#).unwrap();
        assert_eq!(s.score, None);
        let s: Scored = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(s.score, None);
    }
}
