//! Read-side views handed back to collaborators.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{InputKind, Job, JobId, JobOutput, JobStatus};

/// Default page size for job listings.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Short job status returned on submit, cancel and list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_seconds: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl JobSummary {
    /// Summary with a message derived from the job's status.
    pub fn from_job(job: &Job) -> Self {
        Self::with_message(job, default_message(job))
    }

    pub fn with_message(job: &Job, message: impl Into<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            message: message.into(),
            estimated_seconds: None,
            created_at: job.created_at,
        }
    }

    pub fn with_estimate(mut self, estimated_seconds: Option<u32>) -> Self {
        self.estimated_seconds = estimated_seconds;
        self
    }
}

fn default_message(job: &Job) -> String {
    match job.status {
        JobStatus::Pending => "Job queued".to_string(),
        JobStatus::Processing => format!("Video generation in progress ({}%)", job.progress),
        JobStatus::Completed => "Video generation completed".to_string(),
        JobStatus::Failed => "Video generation failed".to_string(),
        JobStatus::Cancelled => "Job cancelled".to_string(),
    }
}

/// Full job view.
///
/// `output` is present only for completed jobs and `error` only for failed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobDetail {
    pub job_id: JobId,
    pub owner_id: String,
    pub status: JobStatus,
    pub input_kind: InputKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobDetail {
    fn from(job: &Job) -> Self {
        let output = match job.status {
            JobStatus::Completed => job.output.clone(),
            _ => None,
        };
        let error = match job.status {
            JobStatus::Failed => job.error_detail.clone(),
            _ => None,
        };

        Self {
            job_id: job.id.clone(),
            owner_id: job.owner_id.clone(),
            status: job.status,
            input_kind: job.input_kind,
            original_prompt: job.input.original_prompt.clone(),
            enhanced_prompt: job.input.enhanced_prompt.clone(),
            progress: job.progress,
            output,
            error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

impl From<Job> for JobDetail {
    fn from(job: Job) -> Self {
        Self::from(&job)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, limit: usize, offset: usize) -> Self {
        let has_more = offset.saturating_add(items.len()) < total;
        Self {
            items,
            total,
            limit,
            offset,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
            has_more: self.has_more,
        }
    }
}

/// Listing filter and paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            owner_id: None,
            status: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl JobQuery {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Copy with `limit` forced into `1..=100`.
    pub fn clamped(&self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_PAGE_LIMIT),
            ..self.clone()
        }
    }

    /// Whether a job passes the owner and status filters.
    pub fn matches(&self, job: &Job) -> bool {
        self.owner_id.as_deref().map_or(true, |o| o == job.owner_id)
            && self.status.map_or(true, |s| s == job.status)
    }
}
