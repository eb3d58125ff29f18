//! Per-job lifecycle logging.
//!
//! Every event carries the same `job_id`, `operation` and (once known)
//! `provider_job_id` fields so a job can be followed through the orchestrator
//! and its poller with a single filter.

use tracing::{error, info, warn, Span};
use vgen_models::{JobId, JobStatus};

#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    operation: &'static str,
    provider_job_id: Option<String>,
}

impl JobLogger {
    /// `operation` names the pipeline step, e.g. `"text_to_video"` or `"poll"`.
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.clone(),
            operation,
            provider_job_id: None,
        }
    }

    pub fn with_provider_job_id(mut self, provider_job_id: impl Into<String>) -> Self {
        self.provider_job_id = Some(provider_job_id.into());
        self
    }

    fn provider(&self) -> &str {
        self.provider_job_id.as_deref().unwrap_or("-")
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            provider_job_id = self.provider(),
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            provider_job_id = self.provider(),
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            provider_job_id = self.provider(),
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            provider_job_id = self.provider(),
            "Job error: {}", message
        );
    }

    /// Log the status a job settled in.
    pub fn log_finished(&self, status: JobStatus, message: &str) {
        match status {
            JobStatus::Failed => error!(
                job_id = %self.job_id,
                operation = self.operation,
                provider_job_id = self.provider(),
                status = %status,
                "Job finished: {}", message
            ),
            _ => info!(
                job_id = %self.job_id,
                operation = self.operation,
                provider_job_id = self.provider(),
                status = %status,
                "Job finished: {}", message
            ),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn provider_job_id(&self) -> Option<&str> {
        self.provider_job_id.as_deref()
    }

    /// Span to instrument a spawned task with.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = self.operation,
            provider_job_id = self.provider()
        )
    }
}
