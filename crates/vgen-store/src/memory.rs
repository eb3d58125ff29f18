//! In-process job store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use vgen_models::{Job, JobId, JobQuery, JobUpdate, NewJob};

use crate::error::{StoreError, StoreResult};
use crate::store::{is_in_flight, is_unsubmitted, page, sort_newest_first, JobStore};

/// Job store backed by a `HashMap` behind a tokio `RwLock`.
///
/// Records live only as long as the process.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn collect_where(&self, keep: fn(&Job) -> bool) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| keep(job))
            .cloned()
            .collect();
        sort_newest_first(&mut jobs);
        jobs
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, new: NewJob) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;

        let mut id = JobId::new();
        while jobs.contains_key(&id) {
            id = JobId::new();
        }

        let job = Job::create(id.clone(), new, Utc::now())
            .map_err(|e| StoreError::from_transition(&id, e))?;
        jobs.insert(id, job.clone());

        debug!(job_id = %job.id, status = %job.status, "Created job");
        Ok(job)
    }

    async fn get(&self, id: &JobId) -> StoreResult<Job> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn list(&self, query: &JobQuery) -> StoreResult<(Vec<Job>, usize)> {
        let query = query.clamped();
        let mut matching: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| query.matches(job))
            .cloned()
            .collect();

        sort_newest_first(&mut matching);
        Ok(page(matching, &query))
    }

    async fn update(&self, id: &JobId, update: JobUpdate) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or_else(|| StoreError::not_found(id))?;

        job.apply(update, Utc::now())
            .map_err(|e| StoreError::from_transition(id, e))?;

        debug!(job_id = %id, status = %job.status, "Updated job");
        Ok(job.clone())
    }

    async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        Ok(self.jobs.write().await.remove(id).is_some())
    }

    async fn list_in_flight(&self) -> StoreResult<Vec<Job>> {
        Ok(self.collect_where(is_in_flight).await)
    }

    async fn list_unsubmitted(&self) -> StoreResult<Vec<Job>> {
        Ok(self.collect_where(is_unsubmitted).await)
    }
}
