//! Background status polling for submitted renders.
//!
//! One tokio task per in-flight job asks the video provider for the render's
//! state until it settles, then writes the terminal status to the store. The
//! registry keeps at most one task per job; a stop signal (`watch` channel)
//! interrupts the wait between attempts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use vgen_models::{JobId, JobOutput, JobStatus, JobUpdate};
use vgen_providers::{ProviderState, VideoSynthesizer};
use vgen_store::{JobStore, StoreError};

use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::FailureTracker;

/// Recorded when the provider reports success but no video location.
pub const MISSING_VIDEO_URL_DETAIL: &str = "provider reported completion without a video URL";

/// Recorded when the provider fails a render without saying why.
pub const UNKNOWN_PROVIDER_ERROR: &str = "Unknown error";

/// Consecutive poll errors logged before suppression.
const MAX_LOGGED_POLL_FAILURES: u32 = 3;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(10),
        }
    }
}

/// How a polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Job recorded as completed
    Completed,
    /// Job recorded as failed by the provider or a final poll error
    Failed,
    /// Attempt budget exhausted; job recorded as failed
    TimedOut,
    /// Job was cancelled by the user
    Cancelled,
    /// Stop signal, or another writer settled the job first
    Stopped,
    /// Job record no longer exists
    Vanished,
}

impl PollOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollOutcome::Completed => "completed",
            PollOutcome::Failed => "failed",
            PollOutcome::TimedOut => "timed_out",
            PollOutcome::Cancelled => "cancelled",
            PollOutcome::Stopped => "stopped",
            PollOutcome::Vanished => "vanished",
        }
    }

    /// Outcome for a job some other writer already settled.
    fn settled_elsewhere(status: JobStatus) -> Self {
        match status {
            JobStatus::Cancelled => PollOutcome::Cancelled,
            _ => PollOutcome::Stopped,
        }
    }
}

fn timeout_detail(attempts: u32) -> String {
    format!(
        "Video generation timed out after {} status checks without a result",
        attempts
    )
}

struct PollerEntry {
    generation: u64,
    stop: watch::Sender<bool>,
    handle: JoinHandle<PollOutcome>,
}

type Registry = Arc<Mutex<HashMap<JobId, PollerEntry>>>;

fn lock(registry: &Mutex<HashMap<JobId, PollerEntry>>) -> MutexGuard<'_, HashMap<JobId, PollerEntry>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Starts, tracks and stops per-job polling tasks.
pub struct StatusPoller {
    synthesizer: Arc<dyn VideoSynthesizer>,
    store: Arc<dyn JobStore>,
    config: PollerConfig,
    registry: Registry,
    next_generation: AtomicU64,
}

impl StatusPoller {
    pub fn new(
        synthesizer: Arc<dyn VideoSynthesizer>,
        store: Arc<dyn JobStore>,
        config: PollerConfig,
    ) -> Self {
        Self {
            synthesizer,
            store,
            config,
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Start polling `job_id` in the background.
    ///
    /// Returns `false` if a poller for this job is already running.
    pub fn spawn(&self, job_id: &JobId, provider_job_id: &str) -> bool {
        let mut registry = lock(&self.registry);
        if registry
            .get(job_id)
            .is_some_and(|entry| !entry.handle.is_finished())
        {
            debug!(job_id = %job_id, "Poller already running");
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = self.task(job_id, provider_job_id, stop_rx);
        let span = task.logger.span();

        let cleanup = Arc::clone(&self.registry);
        let id = job_id.clone();
        let handle = tokio::spawn(
            async move {
                let outcome = task.run().await;
                let mut registry = lock(&cleanup);
                if registry.get(&id).is_some_and(|e| e.generation == generation) {
                    registry.remove(&id);
                }
                metrics::set_active_pollers(registry.len());
                outcome
            }
            .instrument(span),
        );

        registry.insert(
            job_id.clone(),
            PollerEntry {
                generation,
                stop: stop_tx,
                handle,
            },
        );
        metrics::set_active_pollers(registry.len());
        true
    }

    /// Signal the poller for `job_id` to stop. Returns whether one was running.
    pub fn stop(&self, job_id: &JobId) -> bool {
        let entry = {
            let mut registry = lock(&self.registry);
            let entry = registry.remove(job_id);
            metrics::set_active_pollers(registry.len());
            entry
        };

        match entry {
            Some(entry) => {
                let _ = entry.stop.send(true);
                debug!(job_id = %job_id, "Poller stop requested");
                !entry.handle.is_finished()
            }
            None => false,
        }
    }

    pub fn is_active(&self, job_id: &JobId) -> bool {
        lock(&self.registry)
            .get(job_id)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    pub fn active_count(&self) -> usize {
        lock(&self.registry)
            .values()
            .filter(|entry| !entry.handle.is_finished())
            .count()
    }

    /// Stop every poller and wait up to `timeout` for them to exit.
    ///
    /// Returns the number of pollers that exited in time.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let entries: Vec<PollerEntry> = {
            let mut registry = lock(&self.registry);
            let drained = registry.drain().map(|(_, entry)| entry).collect();
            metrics::set_active_pollers(0);
            drained
        };
        if entries.is_empty() {
            return 0;
        }

        let total = entries.len();
        info!(pollers = total, "Stopping status pollers");
        for entry in &entries {
            let _ = entry.stop.send(true);
        }

        let mut exited = 0;
        let wait = async {
            for entry in entries {
                let _ = entry.handle.await;
                exited += 1;
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            warn!(
                pollers = total,
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for status pollers"
            );
        }
        exited
    }

    /// Run the polling loop for one job on the current task.
    pub async fn poll_until_terminal(
        &self,
        job_id: &JobId,
        provider_job_id: &str,
        stop: watch::Receiver<bool>,
    ) -> PollOutcome {
        self.task(job_id, provider_job_id, stop).run().await
    }

    fn task(&self, job_id: &JobId, provider_job_id: &str, stop: watch::Receiver<bool>) -> PollTask {
        PollTask {
            synthesizer: Arc::clone(&self.synthesizer),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            job_id: job_id.clone(),
            provider_job_id: provider_job_id.to_string(),
            logger: JobLogger::new(job_id, "poll").with_provider_job_id(provider_job_id),
            stop,
        }
    }
}

struct PollTask {
    synthesizer: Arc<dyn VideoSynthesizer>,
    store: Arc<dyn JobStore>,
    config: PollerConfig,
    job_id: JobId,
    provider_job_id: String,
    logger: JobLogger,
    stop: watch::Receiver<bool>,
}

impl PollTask {
    async fn run(mut self) -> PollOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let interval = self.config.interval;
        let mut failures = FailureTracker::new(MAX_LOGGED_POLL_FAILURES);
        let mut last_progress = 0u8;

        self.logger.log_start("polling render status");

        for attempt in 1..=max_attempts {
            if *self.stop.borrow() {
                return PollOutcome::Stopped;
            }

            match self.store.get(&self.job_id).await {
                Ok(job) if job.is_terminal() => return PollOutcome::settled_elsewhere(job.status),
                Ok(job) => last_progress = last_progress.max(job.progress),
                Err(StoreError::NotFound(_)) => return PollOutcome::Vanished,
                Err(e) => warn!(job_id = %self.job_id, error = %e, "Could not load job before poll"),
            }

            metrics::record_poll_attempt();
            match self.synthesizer.poll_status(&self.provider_job_id).await {
                Ok(status) => {
                    failures.record_success();
                    match status.state {
                        ProviderState::Completed => {
                            return match status.result_ref.filter(|url| !url.trim().is_empty()) {
                                Some(url) => {
                                    let output = JobOutput::new(url, status.duration_secs);
                                    self.finish(JobUpdate::completed(output), PollOutcome::Completed, "")
                                        .await
                                }
                                None => {
                                    self.finish(
                                        JobUpdate::failed(MISSING_VIDEO_URL_DETAIL),
                                        PollOutcome::Failed,
                                        "provider",
                                    )
                                    .await
                                }
                            };
                        }
                        ProviderState::Failed => {
                            let detail = status
                                .error_msg
                                .filter(|msg| !msg.trim().is_empty())
                                .unwrap_or_else(|| UNKNOWN_PROVIDER_ERROR.to_string());
                            return self
                                .finish(JobUpdate::failed(detail), PollOutcome::Failed, "provider")
                                .await;
                        }
                        ProviderState::Processing => {
                            if status.progress_pct > last_progress {
                                if let Some(outcome) = self.record_progress(status.progress_pct).await {
                                    return outcome;
                                }
                                last_progress = status.progress_pct;
                            }
                        }
                    }
                }
                Err(e) => {
                    metrics::record_provider_error("poll_status");
                    if attempt == max_attempts {
                        let detail = format!(
                            "Polling failed after {} attempts: {}",
                            max_attempts,
                            e.detail()
                        );
                        return self
                            .finish(JobUpdate::failed(detail), PollOutcome::Failed, "polling")
                            .await;
                    }
                    if failures.record_failure() {
                        self.logger.log_warning(&format!(
                            "status check {}/{} failed: {}",
                            attempt, max_attempts, e
                        ));
                    }
                }
            }

            if attempt < max_attempts && self.stopped_during(interval).await {
                return PollOutcome::Stopped;
            }
        }

        self.finish(
            JobUpdate::failed(timeout_detail(max_attempts)),
            PollOutcome::TimedOut,
            "timeout",
        )
        .await
    }

    /// Sleep for `interval` unless the stop signal fires first.
    async fn stopped_during(&mut self, interval: Duration) -> bool {
        let sleep = tokio::time::sleep(interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = self.stop.changed() => match changed {
                    Ok(()) if *self.stop.borrow_and_update() => return true,
                    Ok(()) => continue,
                    Err(_) => {
                        // Sender gone: nobody can stop us any more.
                        (&mut sleep).await;
                        return false;
                    }
                },
            }
        }
    }

    /// Returns an outcome when the write shows the loop must end.
    async fn record_progress(&self, progress: u8) -> Option<PollOutcome> {
        match self.store.update(&self.job_id, JobUpdate::progress(progress)).await {
            Ok(_) => {
                self.logger.log_progress(&format!("render {}%", progress));
                None
            }
            Err(StoreError::Terminal { status, .. }) => Some(PollOutcome::settled_elsewhere(status)),
            Err(StoreError::NotFound(_)) => Some(PollOutcome::Vanished),
            Err(e) => {
                warn!(job_id = %self.job_id, error = %e, "Could not record progress");
                None
            }
        }
    }

    async fn finish(&self, update: JobUpdate, outcome: PollOutcome, reason: &str) -> PollOutcome {
        let detail = update.error_detail.clone();
        match self.store.update(&self.job_id, update).await {
            Ok(job) => {
                match outcome {
                    PollOutcome::Completed => metrics::record_job_completed(),
                    _ => metrics::record_job_failed(reason),
                }
                let message = detail.unwrap_or_else(|| {
                    job.output
                        .as_ref()
                        .map(|o| o.video_url.clone())
                        .unwrap_or_default()
                });
                self.logger.log_finished(job.status, &message);
                outcome
            }
            Err(StoreError::Terminal { status, .. }) => {
                debug!(job_id = %self.job_id, status = %status, "Job settled before poller write");
                PollOutcome::settled_elsewhere(status)
            }
            Err(StoreError::NotFound(_)) => PollOutcome::Vanished,
            Err(e) => {
                // Job stays processing and is picked up again on restart.
                self.logger
                    .log_error(&format!("could not record {}: {}", outcome.as_str(), e));
                PollOutcome::Stopped
            }
        }
    }
}
