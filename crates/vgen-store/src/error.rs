//! Store error types.

use thiserror::Error;
use vgen_models::{JobId, JobStatus, TransitionError};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is already {status}")]
    Terminal { id: String, status: JobStatus },

    #[error("Rejected update for job {id}: {source}")]
    InvalidUpdate {
        id: String,
        #[source]
        source: TransitionError,
    },

    #[error("Update contention on job {0}")]
    Contention(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(id: &JobId) -> Self {
        Self::NotFound(id.to_string())
    }

    /// Classify a rejected state-machine write.
    pub fn from_transition(id: &JobId, err: TransitionError) -> Self {
        match err {
            TransitionError::Terminal { status } => Self::Terminal {
                id: id.to_string(),
                status,
            },
            other => Self::InvalidUpdate {
                id: id.to_string(),
                source: other,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StoreError::Terminal { .. })
    }
}
