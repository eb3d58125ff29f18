//! Job service: the entry points collaborators call.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use validator::Validate;
use vgen_models::{
    ImageJobRequest, JobDetail, JobId, JobQuery, JobStatus, JobSummary, JobUpdate, Page,
    Storyboard, StoryboardRequest, TextJobRequest,
};
use vgen_providers::{PromptEnhancer, VideoSynthesizer};
use vgen_store::{JobStore, StoreError};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::orchestrator::VideoGenerator;
use crate::poller::StatusPoller;
use crate::retry::{retry_async, RetryConfig};

/// Error detail for processing jobs whose submission never reached the provider.
pub const INTERRUPTED_SUBMISSION_DETAIL: &str =
    "Submission interrupted before the provider accepted the job";

pub struct JobService {
    generator: VideoGenerator,
    enhancer: Arc<dyn PromptEnhancer>,
    store: Arc<dyn JobStore>,
    poller: Arc<StatusPoller>,
    shutdown_timeout: Duration,
}

impl JobService {
    pub fn new(
        enhancer: Arc<dyn PromptEnhancer>,
        synthesizer: Arc<dyn VideoSynthesizer>,
        store: Arc<dyn JobStore>,
        config: &WorkerConfig,
    ) -> Self {
        let poller = Arc::new(StatusPoller::new(
            Arc::clone(&synthesizer),
            Arc::clone(&store),
            config.poller_config(),
        ));
        let generator = VideoGenerator::new(
            Arc::clone(&enhancer),
            synthesizer,
            Arc::clone(&store),
            Arc::clone(&poller),
            config.submit_retry(),
        );

        Self {
            generator,
            enhancer,
            store,
            poller,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub async fn submit_text_job(&self, request: TextJobRequest) -> WorkerResult<JobSummary> {
        request.validate_all()?;
        self.generator.generate_from_prompt(&request).await
    }

    pub async fn submit_image_job(&self, request: ImageJobRequest) -> WorkerResult<JobSummary> {
        request.validate_all()?;
        self.generator.generate_from_image(&request).await
    }

    pub async fn get_job(&self, id: &JobId) -> WorkerResult<JobDetail> {
        let job = self.store.get(id).await?;
        Ok(JobDetail::from(job))
    }

    /// Newest first; `limit` is clamped to `1..=100`.
    pub async fn list_jobs(&self, query: JobQuery) -> WorkerResult<Page<JobSummary>> {
        let query = query.clamped();
        let (jobs, total) = self.store.list(&query).await?;
        Ok(Page::new(jobs, total, query.limit, query.offset).map(|job| JobSummary::from_job(&job)))
    }

    /// Cancel a pending or processing job.
    ///
    /// The store transition decides the outcome; stopping the poller and the
    /// provider cancel follow and cannot undo it.
    pub async fn cancel_job(&self, id: &JobId) -> WorkerResult<JobSummary> {
        let job = match self.store.update(id, JobUpdate::cancelled()).await {
            Ok(job) => job,
            Err(StoreError::Terminal { status, .. }) => {
                return Err(WorkerError::Conflict {
                    job_id: id.clone(),
                    status,
                })
            }
            Err(e) => return Err(e.into()),
        };

        metrics::record_job_cancelled();
        self.poller.stop(id);

        let mut logger = JobLogger::new(id, "cancel");
        if let Some(provider_job_id) = &job.provider_job_id {
            logger = logger.with_provider_job_id(provider_job_id);
            self.generator
                .cancel_provider_render(provider_job_id, &logger)
                .await;
        }
        logger.log_finished(job.status, "cancelled by user");

        Ok(JobSummary::from_job(&job))
    }

    pub async fn generate_storyboard(&self, request: StoryboardRequest) -> WorkerResult<Storyboard> {
        request.validate()?;
        self.enhancer
            .generate_storyboard(&request.script, request.num_scenes)
            .await
            .map_err(|e| {
                metrics::record_provider_error("storyboard");
                WorkerError::Provider(e)
            })
    }

    /// Restart pollers for jobs left in flight by a previous process.
    ///
    /// Processing jobs with no provider job ID that this process is not
    /// currently submitting can never be polled, so they are failed.
    /// Returns the number of pollers started.
    pub async fn resume_in_flight(&self) -> WorkerResult<usize> {
        self.fail_unsubmitted().await?;

        let store = &self.store;
        let jobs = retry_async(&RetryConfig::new("list_in_flight"), || store.list_in_flight())
            .await
            .into_result()?;

        let mut started = 0;
        for job in &jobs {
            if let Some(provider_job_id) = &job.provider_job_id {
                if self.poller.spawn(&job.id, provider_job_id) {
                    started += 1;
                }
            }
        }

        if started > 0 {
            info!(
                resumed = started,
                backend = self.store.name(),
                "Resumed polling for in-flight jobs"
            );
        }
        Ok(started)
    }

    async fn fail_unsubmitted(&self) -> WorkerResult<usize> {
        let store = &self.store;
        let jobs = retry_async(&RetryConfig::new("list_unsubmitted"), || {
            store.list_unsubmitted()
        })
        .await
        .into_result()?;

        let mut failed = 0;
        for job in jobs.iter().filter(|job| !self.generator.is_submitting(&job.id)) {
            match self
                .store
                .update(&job.id, JobUpdate::failed(INTERRUPTED_SUBMISSION_DETAIL))
                .await
            {
                Ok(_) => {
                    failed += 1;
                    metrics::record_job_failed("interrupted");
                    JobLogger::new(&job.id, "resume")
                        .log_finished(JobStatus::Failed, INTERRUPTED_SUBMISSION_DETAIL);
                }
                // Settled or acknowledged since the listing.
                Err(StoreError::Terminal { .. }) | Err(StoreError::NotFound(_)) => {}
                Err(e) => warn!(job_id = %job.id, error = %e, "Could not fail interrupted job"),
            }
        }
        Ok(failed)
    }

    /// Stop all pollers, waiting at most the configured shutdown timeout.
    pub async fn shutdown(&self) -> usize {
        self.poller.shutdown(self.shutdown_timeout).await
    }
}
