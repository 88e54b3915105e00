use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::FileId;

/// Banding of a 0-100 risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a score onto its band. Total over every `u8`; anything above 100
    /// lands in `Critical`.
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => RiskLevel::Critical,
            60..=79 => RiskLevel::High,
            40..=59 => RiskLevel::Medium,
            20..=39 => RiskLevel::Low,
            _ => RiskLevel::Minimal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
            RiskLevel::Minimal => "MINIMAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CRITICAL" => Ok(RiskLevel::Critical),
            "HIGH" => Ok(RiskLevel::High),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "LOW" => Ok(RiskLevel::Low),
            "MINIMAL" => Ok(RiskLevel::Minimal),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

/// Attack pattern the service inferred from categorized anomalies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialAttack {
    pub attack_type: String,
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub indicators: String,
    #[serde(default)]
    pub recommendation: String,
}

/// Headline numbers of a security report
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    #[serde(default)]
    pub total_logs: u64,
    #[serde(default)]
    pub total_anomalies: u64,
    #[serde(default, deserialize_with = "super::de_risk_score")]
    pub risk_score: Option<u8>,
    #[serde(default)]
    pub severity_distribution: BTreeMap<String, u64>,
}

impl ReportSummary {
    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.risk_score.map(RiskLevel::from_score)
    }

    pub fn anomaly_rate(&self) -> f64 {
        super::analysis::anomaly_rate(self.total_anomalies, self.total_logs)
    }
}

/// Security report body generated by the analysis service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecurityReport {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub summary: ReportSummary,
    #[serde(default)]
    pub attack_categories: BTreeMap<String, u64>,
    #[serde(default)]
    pub potential_attacks: Vec<PotentialAttack>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// A completed job's report as listed by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    #[serde(default)]
    pub filename: String,
    #[serde(default, deserialize_with = "super::de_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_id: Option<FileId>,
    #[serde(default)]
    pub security_report: Option<SecurityReport>,
}

impl Report {
    pub fn risk_score(&self) -> Option<u8> {
        self.security_report.as_ref().and_then(|r| r.summary.risk_score)
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.risk_score().map(RiskLevel::from_score)
    }

    pub fn potential_attacks(&self) -> &[PotentialAttack] {
        self.security_report
            .as_ref()
            .map(|r| r.potential_attacks.as_slice())
            .unwrap_or(&[])
    }

    pub fn recommendations(&self) -> &[String] {
        self.security_report
            .as_ref()
            .map(|r| r.recommendations.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(19), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Minimal);
    }

    #[test]
    fn test_band_is_total_and_monotonic() {
        let mut previous = RiskLevel::Minimal;
        for score in 0..=100u8 {
            let level = RiskLevel::from_score(score);
            assert!(level >= previous, "banding went down at {}", score);
            previous = level;
        }
    }

    #[test]
    fn test_risk_level_round_trips_through_str() {
        for level in [
            RiskLevel::Minimal,
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ] {
            assert_eq!(level.as_str().parse::<RiskLevel>(), Ok(level));
        }
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_report_deserialization_derives_level() {
        let json = r#"{
            "id": 3,
            "filename": "auth.log",
            "created_at": "2025-07-26T10:00:00Z",
            "security_report": {
                "timestamp": "2025-07-26T10:00:00",
                "summary": {
                    "total_logs": 1000,
                    "total_anomalies": 40,
                    "risk_score": 64.37,
                    "risk_level": "MINIMAL",
                    "severity_distribution": {"critical": 2, "high": 5, "medium": 30, "low": 3}
                },
                "attack_categories": {"authentication": 12},
                "potential_attacks": [{
                    "attack_type": "Brute Force Attack",
                    "severity": "HIGH",
                    "description": "Repeated failed logins",
                    "indicators": "12 authentication anomalies",
                    "recommendation": "Apply account lockout"
                }],
                "recommendations": ["Enable MFA"]
            }
        }"#;

        let report: Report = serde_json::from_str(json).unwrap();
        assert_eq!(report.risk_score(), Some(64));
        // Level comes from the score, not the server's label
        assert_eq!(report.risk_level(), Some(RiskLevel::High));
        assert_eq!(report.potential_attacks().len(), 1);
        assert_eq!(report.recommendations(), &["Enable MFA".to_string()]);
    }

    #[test]
    fn test_report_without_security_section() {
        let report: Report =
            serde_json::from_str(r#"{"id": 1, "filename": "x.log", "created_at": "2025-07-26T10:00:00.123456"}"#)
                .unwrap();
        assert!(report.created_at.is_some());
        assert_eq!(report.risk_level(), None);
        assert!(report.potential_attacks().is_empty());
    }
}
