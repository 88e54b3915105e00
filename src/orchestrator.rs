//! Lifecycle of one analysis job
//!
//! `Idle -> Running -> Completed`, with `Running -> Idle` on failure. While a
//! job is running a repeating task nudges the progress forward by a random
//! step, never past the configured cap; only a confirmed completion sets it
//! to 100.
//!
//! Every async continuation carries the generation it was started under and
//! drops its effects when [`JobOrchestrator::teardown`] (or a newer run) has
//! moved the generation on.

use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::AnalysisApi;
use crate::config::AnalysisConfig;
use crate::models::{AnalysisJob, AnalysisResults, FileId, JobStatus, SecuritySummary};
use crate::notifications::NotificationScheduler;
use crate::report::{summarize, ReportOverview};
use crate::scheduling::{schedule_repeating, ScheduledTask};

const GENERIC_FAILURE: &str = "Analysis failed. Please try again.";

#[derive(Debug, Default)]
struct JobState {
    job: Option<AnalysisJob>,
    summary: Option<SecuritySummary>,
    results: Option<Arc<AnalysisResults>>,
    generation: u64,
}

fn lock_state(state: &Mutex<JobState>) -> MutexGuard<'_, JobState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives one analysis job against the service
pub struct JobOrchestrator {
    api: Arc<dyn AnalysisApi>,
    notifier: NotificationScheduler,
    config: AnalysisConfig,
    state: Arc<Mutex<JobState>>,
    /// Progress task of the current run, tagged with its generation
    progress_timer: Mutex<Option<(u64, ScheduledTask)>>,
}

/// Held by a running `start`. Dropping it stops that run's progress task
/// and, when the run was abandoned mid-flight, puts the job back to `Idle`.
struct RunGuard<'a> {
    orchestrator: &'a JobOrchestrator,
    generation: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.stop_progress(self.generation);

        let mut guard = self.orchestrator.lock();
        let state = &mut *guard;
        if state.generation != self.generation {
            return;
        }
        if let Some(job) = state.job.as_mut().filter(|j| j.status == JobStatus::Running) {
            log::warn!("Analysis of file {} abandoned; job reset", job.file_id);
            job.status = JobStatus::Idle;
            job.progress = 0;
            state.summary = None;
        }
    }
}

impl JobOrchestrator {
    pub fn new(
        api: Arc<dyn AnalysisApi>,
        notifier: NotificationScheduler,
        config: AnalysisConfig,
    ) -> Self {
        JobOrchestrator {
            api,
            notifier,
            config,
            state: Arc::new(Mutex::new(JobState::default())),
            progress_timer: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        lock_state(&self.state)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Current job, if a file has been selected
    pub fn snapshot(&self) -> Option<AnalysisJob> {
        self.lock().job.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.lock()
            .job
            .as_ref()
            .map_or(JobStatus::Idle, |job| job.status)
    }

    pub fn progress(&self) -> u8 {
        self.lock().job.as_ref().map_or(0, |job| job.progress)
    }

    /// False while a run is in flight
    pub fn can_start(&self) -> bool {
        self.status() != JobStatus::Running
    }

    pub fn summary(&self) -> Option<SecuritySummary> {
        self.lock().summary
    }

    pub fn results(&self) -> Option<Arc<AnalysisResults>> {
        self.lock().results.clone()
    }

    /// Aggregates of the current job, zeroed when nothing is known yet
    pub fn overview(&self) -> ReportOverview {
        let state = self.lock();
        let records = state
            .results
            .as_ref()
            .map(|r| r.results.as_slice())
            .unwrap_or_default();
        summarize(records, state.summary.as_ref())
    }

    /// Run the analysis for `file_id` and return the resulting status.
    ///
    /// Without a file id nothing is sent and an error notification is
    /// raised. A call made while a run is in flight is ignored.
    pub async fn start(&self, file_id: Option<FileId>) -> JobStatus {
        let file_id = match file_id {
            Some(id) => id,
            None => {
                log::warn!("Analysis requested without a file");
                self.notifier
                    .error("No file selected", "Select a log file before starting the analysis");
                return self.status();
            }
        };

        let generation = {
            let mut state = self.lock();
            if state.job.as_ref().is_some_and(|j| j.status == JobStatus::Running) {
                log::warn!("Analysis already running; ignoring start for file {}", file_id);
                return JobStatus::Running;
            }
            state.generation += 1;
            state.job = Some(AnalysisJob {
                file_id,
                status: JobStatus::Running,
                progress: 0,
            });
            state.summary = None;
            state.results = None;
            state.generation
        };
        log::info!("Analysis of file {} started", file_id);

        let _run = RunGuard {
            orchestrator: self,
            generation,
        };
        self.start_progress(generation);
        let outcome = self.api.analyze(file_id).await;
        self.stop_progress(generation);

        let summary = match outcome {
            Ok(ack) => ack.summary,
            Err(e) => {
                log::error!("Analysis of file {} failed: {}", file_id, e);
                {
                    let mut state = self.lock();
                    if state.generation != generation {
                        return JobStatus::Idle;
                    }
                    if let Some(job) = state.job.as_mut() {
                        job.status = JobStatus::Idle;
                        job.progress = 0;
                    }
                }
                let message = e.detail().unwrap_or(GENERIC_FAILURE);
                self.notifier.error("Analysis failed", message);
                return JobStatus::Idle;
            }
        };

        {
            let mut state = self.lock();
            if state.generation != generation {
                log::debug!("Discarding analysis outcome for file {}", file_id);
                return JobStatus::Idle;
            }
            if let Some(job) = state.job.as_mut() {
                job.progress = 100;
            }
            state.summary = Some(summary);
        }
        log::info!(
            "Analysis of file {} finished: {} anomalies in {} lines",
            file_id,
            summary.anomaly_count,
            summary.total_lines
        );
        self.notifier.success(
            "Analysis complete",
            format!("{} anomalies detected", summary.anomaly_count),
        );

        let delay = self.config.completion_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.is_current(generation) {
            return JobStatus::Idle;
        }

        let results = self.fetch_results(file_id).await;
        self.complete(generation, results)
    }

    /// Pick up a file that may already have been analyzed. Safe to call
    /// repeatedly; each call re-reads the service state.
    pub async fn load_existing(&self, file_id: FileId) -> JobStatus {
        let generation = {
            let mut state = self.lock();
            if let Some(job) = state.job.as_ref() {
                if job.status == JobStatus::Running {
                    log::warn!("Analysis running; not reloading file {}", file_id);
                    return JobStatus::Running;
                }
            }
            if state.job.as_ref().map(|j| j.file_id) != Some(file_id) {
                state.job = Some(AnalysisJob::new(file_id));
                state.summary = None;
                state.results = None;
            }
            state.generation += 1;
            state.generation
        };

        let files = match self.api.list_files().await {
            Ok(files) => files,
            Err(e) => {
                log::error!("Failed to load file list: {}", e);
                self.notifier
                    .error("File load failed", "File information could not be loaded");
                return self.status();
            }
        };
        if !self.is_current(generation) {
            return JobStatus::Idle;
        }

        match files.iter().find(|f| f.id == file_id) {
            Some(file) if file.is_analyzed => {
                log::info!("File {} ({}) was analyzed before", file_id, file.filename);
                let results = self.fetch_results(file_id).await;
                self.complete(generation, results)
            }
            Some(_) => {
                log::debug!("File {} has not been analyzed yet", file_id);
                self.status()
            }
            None => {
                log::warn!("File {} is not known to the service", file_id);
                self.status()
            }
        }
    }

    /// Stop the progress task and abandon pending work. The current job is
    /// discarded.
    pub fn teardown(&self) {
        self.progress_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let mut state = self.lock();
        state.generation += 1;
        if let Some(job) = state.job.take() {
            log::info!("Discarded job for file {} ({})", job.file_id, job.status);
        }
        state.summary = None;
        state.results = None;
    }

    fn complete(&self, generation: u64, results: Option<AnalysisResults>) -> JobStatus {
        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("Discarding results of an abandoned job");
            return JobStatus::Idle;
        }

        if let Some(summary) = results.as_ref().and_then(|r| r.summary) {
            state.summary = Some(summary);
        }
        state.results = results.map(Arc::new);
        match state.job.as_mut() {
            Some(job) => {
                job.status = JobStatus::Completed;
                job.progress = 100;
                log::info!("Job for file {} completed", job.file_id);
                JobStatus::Completed
            }
            None => JobStatus::Idle,
        }
    }

    async fn fetch_results(&self, file_id: FileId) -> Option<AnalysisResults> {
        match self.api.results(file_id).await {
            Ok(Some(results)) => {
                log::debug!("Fetched {} result records for file {}", results.results.len(), file_id);
                Some(results)
            }
            Ok(None) => {
                log::info!("No results available yet for file {}", file_id);
                None
            }
            Err(e) => {
                log::warn!("Could not fetch results for file {}: {}", file_id, e);
                self.notifier
                    .warning("Results unavailable", "Detailed results could not be loaded");
                None
            }
        }
    }

    fn start_progress(&self, generation: u64) {
        let state = Arc::clone(&self.state);
        let max_step = self.config.progress_max_step.max(1);
        let cap = self.config.progress_cap.min(99);

        let token = schedule_repeating(self.config.progress_interval(), move || {
            let mut state = lock_state(&state);
            if state.generation != generation {
                return;
            }
            if let Some(job) = state.job.as_mut().filter(|j| j.status == JobStatus::Running) {
                let step = rand::thread_rng().gen_range(1..=max_step);
                job.progress = job.progress.saturating_add(step).min(cap).max(job.progress);
                log::trace!("File {} progress {}%", job.file_id, job.progress);
            }
        });

        // Replacing the guard cancels any previous task
        *self
            .progress_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((generation, ScheduledTask::new(token)));
    }

    /// Cancel the progress task of `generation`; a newer run's task is left
    /// alone
    fn stop_progress(&self, generation: u64) {
        let mut timer = self
            .progress_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().is_some_and(|(owner, _)| *owner == generation) {
            timer.take();
        }
    }
}
