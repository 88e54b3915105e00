//! Read-only projections over a job's analysis results
//!
//! Nothing here mutates or caches: counters, rates and risk bands are
//! re-derived from the records every time they are asked for.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::analysis::anomaly_rate;
use crate::models::{AnalysisResultRecord, RiskLevel, SecuritySummary, Severity};

/// Number of filtered records shown at once
pub const DEFAULT_VIEW_LIMIT: usize = 20;

/// Display-ready aggregates for one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOverview {
    /// False when neither a summary nor records exist yet
    pub analyzed: bool,
    pub total_lines: u64,
    pub anomaly_count: u64,
    pub critical_count: u64,
    pub anomaly_rate: f64,
    pub risk_score: Option<u8>,
    pub risk_level: Option<RiskLevel>,
    /// Anomalous records per severity
    pub severity_distribution: BTreeMap<Severity, u64>,
}

/// Band a risk score
pub fn band(score: u8) -> RiskLevel {
    RiskLevel::from_score(score)
}

/// Aggregate a job's records and summary.
///
/// Counters come from the records when there are any and fall back to the
/// service summary otherwise. Without either, everything is zero.
pub fn summarize(
    records: &[AnalysisResultRecord],
    summary: Option<&SecuritySummary>,
) -> ReportOverview {
    let risk_score = summary.and_then(|s| s.risk_score);
    let mut severity_distribution = BTreeMap::new();

    let (total_lines, anomaly_count, critical_count) = if records.is_empty() {
        match summary {
            Some(s) => {
                let anomalies = s.anomaly_count.min(s.total_lines);
                (s.total_lines, anomalies, s.critical_count.min(anomalies))
            }
            None => (0, 0, 0),
        }
    } else {
        let mut anomalies = 0u64;
        let mut critical = 0u64;
        for record in records.iter().filter(|r| r.is_anomaly) {
            anomalies += 1;
            if record.severity == Severity::Critical {
                critical += 1;
            }
            *severity_distribution
                .entry(record.severity.clone())
                .or_insert(0) += 1;
        }
        let evaluated = records.len() as u64;
        let total = summary.map_or(evaluated, |s| s.total_lines.max(evaluated));
        (total, anomalies, critical)
    };

    ReportOverview {
        analyzed: summary.is_some() || !records.is_empty(),
        total_lines,
        anomaly_count,
        critical_count,
        anomaly_rate: anomaly_rate(anomaly_count, total_lines),
        risk_score,
        risk_level: risk_score.map(band),
        severity_distribution,
    }
}

/// Which records pass the severity predicate
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeverityFilter {
    #[default]
    All,
    Anomalies,
    Level(Severity),
}

impl SeverityFilter {
    fn matches(&self, record: &AnalysisResultRecord) -> bool {
        match self {
            SeverityFilter::All => true,
            SeverityFilter::Anomalies => record.is_anomaly,
            SeverityFilter::Level(level) => record.severity == *level,
        }
    }
}

impl FromStr for SeverityFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "all" | "" => SeverityFilter::All,
            "anomalies" => SeverityFilter::Anomalies,
            other => SeverityFilter::Level(Severity::from(other)),
        })
    }
}

impl fmt::Display for SeverityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityFilter::All => f.write_str("all"),
            SeverityFilter::Anomalies => f.write_str("anomalies"),
            SeverityFilter::Level(level) => write!(f, "{}", level),
        }
    }
}

/// Search term plus severity predicate, ANDed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultFilter {
    pub search_term: String,
    pub severity: SeverityFilter,
}

impl ResultFilter {
    pub fn new(search_term: impl Into<String>, severity: SeverityFilter) -> Self {
        ResultFilter {
            search_term: search_term.into(),
            severity,
        }
    }

    pub fn matches(&self, record: &AnalysisResultRecord) -> bool {
        self.severity.matches(record) && contains_ignore_case(&record.content, &self.search_term)
    }
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Every record passing `criteria`, in the order supplied
pub fn filter<'a>(
    records: &'a [AnalysisResultRecord],
    criteria: &ResultFilter,
) -> Vec<&'a AnalysisResultRecord> {
    records.iter().filter(|r| criteria.matches(r)).collect()
}

/// The first `limit` filtered records plus the size of the full match set
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView<'a> {
    pub records: Vec<&'a AnalysisResultRecord>,
    pub total_matches: usize,
}

impl ResultView<'_> {
    pub fn is_truncated(&self) -> bool {
        self.total_matches > self.records.len()
    }
}

/// Filter, then cap for display
pub fn view<'a>(
    records: &'a [AnalysisResultRecord],
    criteria: &ResultFilter,
    limit: usize,
) -> ResultView<'a> {
    let mut matches = filter(records, criteria);
    let total_matches = matches.len();
    matches.truncate(limit);
    ResultView {
        records: matches,
        total_matches,
    }
}

/// Shorten log content for display, cutting on a char boundary
pub fn preview(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &content[..cut])),
        None => Cow::Borrowed(content),
    }
}
