//! Report aggregation and the report catalog
//!
//! [`aggregator`] turns a job's records into counters, filtered views and
//! previews. [`catalog`] lists, searches, opens and exports the reports
//! the service produced.

pub mod aggregator;
pub mod catalog;

pub use aggregator::{
    band, filter, preview, summarize, view, ReportOverview, ResultFilter, ResultView,
    SeverityFilter, DEFAULT_VIEW_LIMIT,
};
pub use catalog::{search, ReportCatalog, ReportDetail, RiskFilter};
