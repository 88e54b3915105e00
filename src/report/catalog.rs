//! Listing, searching and exporting completed security reports

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use super::aggregator::{band, contains_ignore_case, summarize, ReportOverview};
use crate::api::AnalysisApi;
use crate::export::{report_filename, ExportError, FileSaver};
use crate::models::{AnalysisResults, Report, RiskLevel};
use crate::notifications::{NotificationRequest, NotificationScheduler};

/// Risk level predicate for report searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskFilter {
    #[default]
    All,
    Level(RiskLevel),
}

impl FromStr for RiskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(RiskFilter::All)
        } else {
            s.parse().map(RiskFilter::Level)
        }
    }
}

impl fmt::Display for RiskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskFilter::All => f.write_str("all"),
            RiskFilter::Level(level) => write!(f, "{}", level),
        }
    }
}

/// Reports whose filename or risk level contains `term` (case-insensitive)
/// and whose level passes `level`
pub fn search<'a>(reports: &'a [Report], term: &str, level: RiskFilter) -> Vec<&'a Report> {
    reports
        .iter()
        .filter(|report| {
            let risk = report.risk_level();
            let matches_term = contains_ignore_case(&report.filename, term)
                || risk.is_some_and(|r| contains_ignore_case(r.as_str(), term));
            let matches_level = match level {
                RiskFilter::All => true,
                RiskFilter::Level(wanted) => risk == Some(wanted),
            };
            matches_term && matches_level
        })
        .collect()
}

/// A report opened for browsing together with its job's aggregates
#[derive(Debug, Clone)]
pub struct ReportDetail {
    pub report: Report,
    pub overview: ReportOverview,
    /// Per-line results of the originating job, when still available
    pub results: Option<Arc<AnalysisResults>>,
}

/// Front end to the report listing of the analysis service
#[derive(Clone)]
pub struct ReportCatalog {
    api: Arc<dyn AnalysisApi>,
    notifier: NotificationScheduler,
    saver: Arc<dyn FileSaver>,
}

impl ReportCatalog {
    pub fn new(
        api: Arc<dyn AnalysisApi>,
        notifier: NotificationScheduler,
        saver: Arc<dyn FileSaver>,
    ) -> Self {
        ReportCatalog {
            api,
            notifier,
            saver,
        }
    }

    /// Fetch every report. Transport failures are reported to the operator
    /// and yield an empty list.
    pub async fn list(&self) -> Vec<Report> {
        match self.api.list_reports().await {
            Ok(reports) => {
                log::info!("Loaded {} report(s)", reports.len());
                reports
            }
            Err(e) => {
                log::error!("Failed to load reports: {}", e);
                self.notifier.enqueue(
                    NotificationRequest::error("Report load failed")
                        .message("Reports could not be loaded"),
                );
                Vec::new()
            }
        }
    }

    /// Look a report up by id in a fresh listing
    pub async fn find(&self, report_id: i64) -> Option<Report> {
        let found = self.list().await.into_iter().find(|r| r.id == report_id);
        if found.is_none() {
            log::warn!("Report {} not found", report_id);
        }
        found
    }

    /// Build the browsable view of a report. Results of the originating job
    /// are fetched when the report names its file; their absence is not an
    /// error.
    pub async fn open(&self, report: &Report) -> ReportDetail {
        let results = match report.file_id {
            Some(file_id) => match self.api.results(file_id).await {
                Ok(results) => results.map(Arc::new),
                Err(e) => {
                    log::warn!("Could not fetch results for report {}: {}", report.id, e);
                    None
                }
            },
            None => None,
        };

        let overview = match &results {
            Some(r) => {
                let mut overview = summarize(&r.results, r.summary.as_ref());
                // Results may come without a score; the report always has one
                if overview.risk_score.is_none() {
                    overview.risk_score = report.risk_score();
                    overview.risk_level = overview.risk_score.map(band);
                }
                overview
            }
            None => overview_from_report(report),
        };

        ReportDetail {
            report: report.clone(),
            overview,
            results,
        }
    }

    /// Download a report and hand it to the file saver. Returns the saved
    /// path; failures are reported to the operator.
    pub async fn export(&self, report_id: i64) -> Option<PathBuf> {
        match self.try_export(report_id).await {
            Ok(path) => {
                self.notifier.enqueue(
                    NotificationRequest::success("Report downloaded")
                        .message(format!("Security report saved to {}", path.display()))
                        .duration(std::time::Duration::from_millis(3000)),
                );
                Some(path)
            }
            Err(e) => {
                log::error!("Export of report {} failed: {}", report_id, e);
                self.notifier.enqueue(
                    NotificationRequest::error("Download failed")
                        .message("The report could not be downloaded"),
                );
                None
            }
        }
    }

    async fn try_export(&self, report_id: i64) -> Result<PathBuf, ExportError> {
        let contents = self.api.download_report(report_id).await?;
        self.saver.save(&contents, &report_filename(report_id))
    }
}

/// Aggregates a report carries by itself, used when the job's records are
/// gone
fn overview_from_report(report: &Report) -> ReportOverview {
    let summary = report.security_report.as_ref().map(|r| &r.summary);
    let total_lines = summary.map_or(0, |s| s.total_logs);
    let anomaly_count = summary.map_or(0, |s| s.total_anomalies.min(total_lines));
    let critical_count = summary
        .and_then(|s| s.severity_distribution.get("critical").copied())
        .unwrap_or(0)
        .min(anomaly_count);
    let risk_score = report.risk_score();

    ReportOverview {
        analyzed: summary.is_some(),
        total_lines,
        anomaly_count,
        critical_count,
        anomaly_rate: summary.map_or(0.0, |s| s.anomaly_rate()),
        risk_score,
        risk_level: report.risk_level(),
        severity_distribution: summary
            .map(|s| {
                s.severity_distribution
                    .iter()
                    .map(|(k, v)| (k.as_str().into(), *v))
                    .collect()
            })
            .unwrap_or_default(),
    }
}
