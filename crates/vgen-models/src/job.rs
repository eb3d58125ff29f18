//! Generation jobs and their lifecycle state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::params::GenerationParams;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of input a job was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Image,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Image => "image",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status.
///
/// ```text
/// pending    -> processing | cancelled
/// processing -> completed | failed | cancelled
/// ```
///
/// Completed, failed and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not yet handed to the provider
    #[default]
    Pending,
    /// Submitted to the provider, render in progress
    Processing,
    /// Provider delivered a video
    Completed,
    /// Provider, submission or polling failure
    Failed,
    /// Cancelled by the user
    Cancelled,
}

impl JobStatus {
    pub const ALL: &'static [JobStatus] = &[
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more updates accepted).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine has an edge from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" | "canceled" => Ok(JobStatus::Cancelled),
            _ => Err(JobStatusParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown job status: {0}")]
pub struct JobStatusParseError(String);

/// Input payload recorded when the job is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobInput {
    /// Prompt as the user typed it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<String>,

    /// Prompt actually sent to the video provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,

    /// Source image (image jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Scene description produced by image analysis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_analysis: Option<String>,

    /// Image analysis fell back to a generic description
    #[serde(default)]
    pub analysis_degraded: bool,

    /// Generation parameters
    pub params: GenerationParams,
}

impl JobInput {
    /// Kind of job this input describes.
    pub fn kind(&self) -> InputKind {
        self.params.kind()
    }
}

/// Provider result recorded on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobOutput {
    /// Location of the generated video
    pub video_url: String,
    /// Video duration in seconds, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// When the result was recorded
    pub generated_at: DateTime<Utc>,
}

impl JobOutput {
    pub fn new(video_url: impl Into<String>, duration_secs: Option<f64>) -> Self {
        Self {
            video_url: video_url.into(),
            duration_secs,
            generated_at: Utc::now(),
        }
    }
}

/// Parameters for creating a job record.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: String,
    pub input: JobInput,
    pub initial_status: JobStatus,
}

impl NewJob {
    pub fn new(owner_id: impl Into<String>, input: JobInput, initial_status: JobStatus) -> Self {
        Self {
            owner_id: owner_id.into(),
            input,
            initial_status,
        }
    }

    pub fn input_kind(&self) -> InputKind {
        self.input.kind()
    }
}

/// A video generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Requesting caller
    pub owner_id: String,

    /// Text or image input
    pub input_kind: InputKind,

    /// Input payload
    pub input: JobInput,

    /// Current status
    pub status: JobStatus,

    /// Job ID assigned by the video provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_job_id: Option<String>,

    /// Progress reported by the provider (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Result (completed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,

    /// Failure cause (failed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build the initial record for a new job.
    ///
    /// Only pending and processing are valid starting points.
    pub fn create(id: JobId, new: NewJob, now: DateTime<Utc>) -> Result<Self, TransitionError> {
        if !matches!(new.initial_status, JobStatus::Pending | JobStatus::Processing) {
            return Err(TransitionError::InvalidInitialStatus(new.initial_status));
        }

        Ok(Self {
            id,
            owner_id: new.owner_id,
            input_kind: new.input.kind(),
            input: new.input,
            status: new.initial_status,
            provider_job_id: None,
            progress: 0,
            output: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a partial update, enforcing the state machine and payload rules.
    ///
    /// Either the whole update is applied or the job is left untouched.
    pub fn apply(&mut self, update: JobUpdate, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal {
                status: self.status,
            });
        }

        let target = update.status.unwrap_or(self.status);
        if target != self.status && !self.status.can_transition_to(target) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        match (target, update.output.is_some()) {
            (JobStatus::Completed, false) => return Err(TransitionError::MissingOutput),
            (JobStatus::Completed, true) => {}
            (_, true) => return Err(TransitionError::UnexpectedOutput),
            (_, false) => {}
        }

        let has_error = update
            .error_detail
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty());
        match (target, has_error) {
            (JobStatus::Failed, false) => return Err(TransitionError::MissingError),
            (JobStatus::Failed, true) => {}
            (_, _) if update.error_detail.is_some() => {
                return Err(TransitionError::UnexpectedError)
            }
            _ => {}
        }

        if let (Some(existing), Some(incoming)) = (&self.provider_job_id, &update.provider_job_id) {
            if existing != incoming {
                return Err(TransitionError::ProviderJobIdConflict {
                    existing: existing.clone(),
                });
            }
        }

        self.status = target;
        if let Some(provider_job_id) = update.provider_job_id {
            self.provider_job_id = Some(provider_job_id);
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if target == JobStatus::Completed {
            self.progress = 100;
        }
        self.output = update.output;
        self.error_detail = update.error_detail;
        self.updated_at = now.max(self.updated_at);

        Ok(())
    }
}

/// Partial update of a job record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub provider_job_id: Option<String>,
    pub progress: Option<u8>,
    pub output: Option<JobOutput>,
    pub error_detail: Option<String>,
}

impl JobUpdate {
    /// Move the job to processing.
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            ..Default::default()
        }
    }

    /// Record the provider's job ID without changing status.
    pub fn provider_job_id(provider_job_id: impl Into<String>) -> Self {
        Self {
            provider_job_id: Some(provider_job_id.into()),
            ..Default::default()
        }
    }

    /// Record provider progress without changing status.
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Mark job as completed with the provider result.
    pub fn completed(output: JobOutput) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            output: Some(output),
            ..Default::default()
        }
    }

    /// Mark job as failed with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_detail: Some(error.into()),
            ..Default::default()
        }
    }

    /// Mark job as cancelled.
    pub fn cancelled() -> Self {
        Self {
            status: Some(JobStatus::Cancelled),
            ..Default::default()
        }
    }

    pub fn with_provider_job_id(mut self, provider_job_id: impl Into<String>) -> Self {
        self.provider_job_id = Some(provider_job_id.into());
        self
    }
}

/// Rejected job update.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("job is already {status}")]
    Terminal { status: JobStatus },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("jobs cannot be created as {0}")]
    InvalidInitialStatus(JobStatus),

    #[error("completed jobs require an output payload")]
    MissingOutput,

    #[error("failed jobs require an error detail")]
    MissingError,

    #[error("output payload is only allowed on completed jobs")]
    UnexpectedOutput,

    #[error("error detail is only allowed on failed jobs")]
    UnexpectedError,

    #[error("provider job id already recorded as {existing}")]
    ProviderJobIdConflict { existing: String },
}
