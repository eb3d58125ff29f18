//! Worker error types.

use thiserror::Error;
use validator::ValidationErrors;
use vgen_models::{JobId, JobStatus};
use vgen_providers::ProviderError;
use vgen_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Request rejected before any job was created.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The job was created and is now failed.
    #[error("Submission failed for job {job_id}: {}", .source.detail())]
    SubmissionFailed {
        job_id: JobId,
        #[source]
        source: ProviderError,
    },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is already {status}")]
    Conflict { job_id: JobId, status: JobStatus },

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkerError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, WorkerError::Conflict { .. })
    }

    /// Job the error belongs to, when one was created.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            WorkerError::SubmissionFailed { job_id, .. } | WorkerError::Conflict { job_id, .. } => {
                Some(job_id)
            }
            _ => None,
        }
    }
}

impl From<StoreError> for WorkerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WorkerError::NotFound(id),
            other => WorkerError::Store(other),
        }
    }
}

impl From<ValidationErrors> for WorkerError {
    fn from(errors: ValidationErrors) -> Self {
        WorkerError::Validation(errors.to_string())
    }
}
