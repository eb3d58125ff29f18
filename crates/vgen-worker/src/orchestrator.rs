//! Generation pipeline: analyze, enhance, record, submit, hand off to the poller.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, warn};
use vgen_models::{
    GenerationParams, ImageJobRequest, Job, JobId, JobInput, JobStatus, JobSummary, JobUpdate,
    NewJob, TextJobRequest,
};
use vgen_providers::{
    EnhanceContext, PromptEnhancer, ProviderError, SubmitReceipt, VideoSynthesizer,
};
use vgen_store::{JobStore, StoreError};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::poller::StatusPoller;
use crate::retry::{retry_async_if, RetryConfig};

const STARTED_MESSAGE: &str = "Video generation started";

type Submissions = Mutex<HashSet<JobId>>;

fn lock(submissions: &Submissions) -> MutexGuard<'_, HashSet<JobId>> {
    submissions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a job as awaiting its provider acknowledgement until dropped.
struct SubmissionGuard<'a> {
    submissions: &'a Submissions,
    job_id: JobId,
}

impl<'a> SubmissionGuard<'a> {
    fn enter(submissions: &'a Submissions, job_id: &JobId) -> Self {
        lock(submissions).insert(job_id.clone());
        Self {
            submissions,
            job_id: job_id.clone(),
        }
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        lock(self.submissions).remove(&self.job_id);
    }
}

/// Drives a validated request to an accepted render.
///
/// Returns as soon as the provider has accepted the job; completion is
/// tracked by the [`StatusPoller`].
pub struct VideoGenerator {
    enhancer: Arc<dyn PromptEnhancer>,
    synthesizer: Arc<dyn VideoSynthesizer>,
    store: Arc<dyn JobStore>,
    poller: Arc<StatusPoller>,
    submit_retry: RetryConfig,
    submissions: Submissions,
}

impl VideoGenerator {
    pub fn new(
        enhancer: Arc<dyn PromptEnhancer>,
        synthesizer: Arc<dyn VideoSynthesizer>,
        store: Arc<dyn JobStore>,
        poller: Arc<StatusPoller>,
        submit_retry: RetryConfig,
    ) -> Self {
        Self {
            enhancer,
            synthesizer,
            store,
            poller,
            submit_retry,
            submissions: Mutex::new(HashSet::new()),
        }
    }

    /// Whether this process is still waiting on the provider to accept the job.
    pub fn is_submitting(&self, job_id: &JobId) -> bool {
        lock(&self.submissions).contains(job_id)
    }

    /// Text-to-video: enhance, create as processing, submit.
    pub async fn generate_from_prompt(&self, request: &TextJobRequest) -> WorkerResult<JobSummary> {
        let prompt = request.prompt.trim();
        let params = request.params();

        let enhanced = self
            .enhancer
            .enhance(prompt, EnhanceContext::TextToVideo)
            .await;

        let input = JobInput {
            original_prompt: Some(prompt.to_string()),
            enhanced_prompt: Some(enhanced.clone()),
            image_path: None,
            image_analysis: None,
            analysis_degraded: false,
            params: GenerationParams::Text(params.clone()),
        };
        let job = self
            .store
            .create(NewJob::new(&request.owner_id, input, JobStatus::Processing))
            .await?;

        let _submitting = SubmissionGuard::enter(&self.submissions, &job.id);
        let logger = JobLogger::new(&job.id, "text_to_video");
        logger.log_start(prompt);

        let synthesizer = &self.synthesizer;
        let result = retry_async_if(&self.submit_retry, ProviderError::is_retryable, || {
            synthesizer.submit_text_to_video(&enhanced, &params)
        })
        .await
        .into_result();

        self.settle_submission(job, result, logger).await
    }

    /// Image-to-video: analyze, enhance the description, create as processing, submit.
    ///
    /// A failed analysis degrades to a generic description and never aborts.
    pub async fn generate_from_image(&self, request: &ImageJobRequest) -> WorkerResult<JobSummary> {
        let params = request.params();
        let user_prompt = request.trimmed_prompt();

        let analysis = self.enhancer.analyze_image(&request.image_path).await;
        if analysis.degraded {
            warn!(
                image_path = %request.image_path,
                error = analysis.error.as_deref().unwrap_or("unknown"),
                "Image analysis degraded, using fallback description"
            );
        }

        let composed = match user_prompt {
            Some(prompt) => format!("{}. {}", analysis.description, prompt),
            None => analysis.description.clone(),
        };
        let enhanced = self
            .enhancer
            .enhance(&composed, EnhanceContext::ImageToVideo)
            .await;

        let input = JobInput {
            original_prompt: user_prompt.map(str::to_string),
            enhanced_prompt: Some(enhanced.clone()),
            image_path: Some(request.image_path.clone()),
            image_analysis: Some(analysis.description),
            analysis_degraded: analysis.degraded,
            params: GenerationParams::Image(params.clone()),
        };
        let job = self
            .store
            .create(NewJob::new(&request.owner_id, input, JobStatus::Processing))
            .await?;

        let _submitting = SubmissionGuard::enter(&self.submissions, &job.id);
        let logger = JobLogger::new(&job.id, "image_to_video");
        logger.log_start(&request.image_path);

        let synthesizer = &self.synthesizer;
        let image_path = request.image_path.as_str();
        let result = retry_async_if(&self.submit_retry, ProviderError::is_retryable, || {
            synthesizer.submit_image_to_video(image_path, Some(&enhanced), &params)
        })
        .await
        .into_result();

        self.settle_submission(job, result, logger).await
    }

    /// Record the submission result and start the poller on success.
    async fn settle_submission(
        &self,
        job: Job,
        result: Result<SubmitReceipt, ProviderError>,
        logger: JobLogger,
    ) -> WorkerResult<JobSummary> {
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(err) => return self.fail_submission(job, err, &logger).await,
        };

        let logger = logger.with_provider_job_id(&receipt.provider_job_id);
        metrics::record_job_submitted(job.input_kind.as_str());

        match self
            .store
            .update(&job.id, JobUpdate::provider_job_id(&receipt.provider_job_id))
            .await
        {
            Ok(job) => {
                self.poller.spawn(&job.id, &receipt.provider_job_id);
                logger.log_progress(&format!(
                    "render accepted, estimated {}s",
                    receipt.estimated_seconds
                ));
                Ok(JobSummary::with_message(&job, STARTED_MESSAGE)
                    .with_estimate(Some(receipt.estimated_seconds)))
            }
            Err(StoreError::Terminal { status, .. }) => {
                logger.log_warning(&format!("job became {} during submission", status));
                self.cancel_provider_render(&receipt.provider_job_id, &logger)
                    .await;
                let job = self.store.get(&job.id).await?;
                Ok(JobSummary::from_job(&job))
            }
            Err(e) => {
                logger.log_error(&format!("could not record provider job id: {}", e));
                self.cancel_provider_render(&receipt.provider_job_id, &logger)
                    .await;
                let detail = format!("Could not record provider job: {}", e);
                if let Err(mark) = self.store.update(&job.id, JobUpdate::failed(detail)).await {
                    error!(
                        job_id = %job.id,
                        error = %mark,
                        "Could not mark job failed, it stays processing until the next resume"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Mark the job failed after a rejected submission.
    ///
    /// A job cancelled while the submission was in flight stays cancelled and
    /// its current summary is returned instead of an error.
    async fn fail_submission(
        &self,
        job: Job,
        err: ProviderError,
        logger: &JobLogger,
    ) -> WorkerResult<JobSummary> {
        let detail = err.detail();
        metrics::record_provider_error("submit");

        match self.store.update(&job.id, JobUpdate::failed(detail.clone())).await {
            Ok(_) => {}
            Err(StoreError::Terminal { status, .. }) => {
                logger.log_warning(&format!(
                    "submission failed after job became {}: {}",
                    status, detail
                ));
                let job = self.store.get(&job.id).await?;
                return Ok(JobSummary::from_job(&job));
            }
            Err(e) => error!(
                job_id = %job.id,
                error = %e,
                "Could not mark job failed, it stays processing until the next resume"
            ),
        }

        metrics::record_job_failed("submission");
        logger.log_finished(JobStatus::Failed, &detail);
        Err(WorkerError::SubmissionFailed {
            job_id: job.id,
            source: err,
        })
    }

    /// Ask the provider to stop a render. Best effort: the outcome never
    /// changes local job state.
    pub async fn cancel_provider_render(&self, provider_job_id: &str, logger: &JobLogger) -> bool {
        match self.synthesizer.cancel(provider_job_id).await {
            Ok(true) => {
                logger.log_progress("provider render cancelled");
                true
            }
            Ok(false) => {
                logger.log_warning("provider declined to cancel render");
                false
            }
            Err(e) => {
                metrics::record_provider_error("cancel");
                logger.log_warning(&format!("provider cancel failed: {}", e));
                false
            }
        }
    }
}
