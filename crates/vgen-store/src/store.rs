//! Job record store contract.

use async_trait::async_trait;
use vgen_models::{Job, JobId, JobQuery, JobStatus, JobUpdate, NewJob};

use crate::error::StoreResult;

/// Persistent job records.
///
/// Every `update` is atomic and validated by [`Job::apply`], so a terminal
/// job can never be overwritten no matter how many writers race on it.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Create a job with a fresh ID. The initial status must be pending or processing.
    async fn create(&self, new: NewJob) -> StoreResult<Job>;

    async fn get(&self, id: &JobId) -> StoreResult<Job>;

    /// Jobs matching the query, newest first, plus the total match count.
    async fn list(&self, query: &JobQuery) -> StoreResult<(Vec<Job>, usize)>;

    /// Owner-scoped listing.
    async fn list_by_owner(
        &self,
        owner_id: &str,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> StoreResult<(Vec<Job>, usize)> {
        let mut query = JobQuery::for_owner(owner_id).with_page(limit, offset);
        query.status = status;
        self.list(&query).await
    }

    /// Apply a partial update atomically and return the new record.
    async fn update(&self, id: &JobId, update: JobUpdate) -> StoreResult<Job>;

    /// Hard delete. Returns whether a record existed.
    async fn delete(&self, id: &JobId) -> StoreResult<bool>;

    /// Processing jobs that already have a provider job ID.
    async fn list_in_flight(&self) -> StoreResult<Vec<Job>>;

    /// Processing jobs the provider never acknowledged.
    async fn list_unsubmitted(&self) -> StoreResult<Vec<Job>>;
}

/// Whether a record still needs status polling.
pub fn is_in_flight(job: &Job) -> bool {
    job.status == JobStatus::Processing && job.provider_job_id.is_some()
}

/// Whether a record is processing without a provider job ID.
pub fn is_unsubmitted(job: &Job) -> bool {
    job.status == JobStatus::Processing && job.provider_job_id.is_none()
}

/// Sort newest first, breaking ties by ID so paging is stable.
pub(crate) fn sort_newest_first(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.as_str().cmp(a.id.as_str()))
    });
}

/// Apply paging to an already filtered and sorted list.
pub(crate) fn page(jobs: Vec<Job>, query: &JobQuery) -> (Vec<Job>, usize) {
    let total = jobs.len();
    let items = jobs
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect();
    (items, total)
}
