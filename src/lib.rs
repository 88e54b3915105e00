pub mod api;
pub mod config;
pub mod export;
pub mod models;
pub mod notifications;
pub mod orchestrator;
pub mod report;
pub mod scheduling;
pub mod upload;

// Re-export commonly used types
pub use api::{AnalysisApi, ApiError, HttpApiClient};
pub use config::{Config, ConfigError};
pub use export::{DiskFileSaver, ExportError, FileSaver};
pub use models::{AnalysisJob, AnalysisResultRecord, AnalysisResults, FileId, JobStatus, Report, RiskLevel};
pub use notifications::{Notification, NotificationKind, NotificationRequest, NotificationScheduler};
pub use orchestrator::JobOrchestrator;
pub use report::{ReportCatalog, ReportDetail, ReportOverview, ResultFilter, RiskFilter, SeverityFilter};
pub use scheduling::{schedule_repeating, ScheduledTask};
pub use upload::{UploadError, Uploader};
