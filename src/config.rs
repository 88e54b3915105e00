use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// A setting that loaded but cannot be used
#[derive(Error, Debug, PartialEq)]
#[error("Invalid setting {field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError {
        field,
        reason: reason.into(),
    }
}

/// Configuration for the Loggy client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Analysis service connection
    pub api: ApiConfig,
    /// Analysis job pacing
    pub analysis: AnalysisConfig,
    /// Notification defaults
    pub notifications: NotificationConfig,
    /// Report view limits
    pub report: ReportConfig,
    /// Export destination
    pub export: ExportConfig,
}

/// Analysis service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the analysis service
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Analysis job pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Interval between simulated progress ticks in milliseconds
    pub progress_interval_ms: u64,
    /// Largest random increment applied on one tick
    pub progress_max_step: u8,
    /// Ceiling for simulated progress; 100 is reserved for confirmed completion
    pub progress_cap: u8,
    /// Pause between the analysis acknowledgement and the results fetch
    pub completion_delay_ms: u64,
}

/// Notification defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Lifetime of a notification that does not set its own duration
    pub default_duration_ms: u64,
}

/// Report view limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Maximum number of filtered records shown at once
    pub view_limit: usize,
    /// Number of characters of log content shown per record
    pub preview_chars: usize,
}

/// Export destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory downloaded reports are written to
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                base_url: "http://localhost:8000".to_string(),
                request_timeout_secs: 30,
            },
            analysis: AnalysisConfig::default(),
            notifications: NotificationConfig {
                default_duration_ms: 5000,
            },
            report: ReportConfig {
                view_limit: 20,
                preview_chars: 120,
            },
            export: ExportConfig {
                output_dir: PathBuf::from("."),
            },
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            progress_interval_ms: 500,
            progress_max_step: 10,
            progress_cap: 90,
            completion_delay_ms: 1000,
        }
    }
}

impl AnalysisConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl NotificationConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_duration_ms)
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        log::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Write configuration as TOML
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        self.validate()?;
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject settings the client cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid(
                "api.base_url",
                format!("{:?} is not an http(s) URL", base_url),
            ));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(invalid("api.request_timeout_secs", "must be at least 1"));
        }
        if self.analysis.progress_interval_ms == 0 {
            return Err(invalid("analysis.progress_interval_ms", "must be at least 1"));
        }
        if self.analysis.progress_max_step == 0 {
            return Err(invalid("analysis.progress_max_step", "must be at least 1"));
        }
        if self.analysis.progress_cap >= 100 {
            return Err(invalid("analysis.progress_cap", "must stay below 100"));
        }
        if self.notifications.default_duration_ms == 0 {
            return Err(invalid("notifications.default_duration_ms", "must be at least 1"));
        }
        if self.report.view_limit == 0 {
            return Err(invalid("report.view_limit", "must be at least 1"));
        }
        Ok(())
    }
}
