//! Scripted providers shared by the worker integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use vgen_models::{
    ImageToVideoParams, Job, JobId, Storyboard, StoryboardScene, TextToVideoParams,
};
use vgen_providers::{
    EnhanceContext, ImageAnalysis, PromptEnhancer, ProviderError, ProviderResult,
    ProviderStatus, SubmitReceipt, VideoSynthesizer,
};
use vgen_store::JobStore;
use vgen_worker::WorkerConfig;

pub const ENHANCED_SUFFIX: &str = ", cinematic lighting";

/// Worker config with millisecond timings.
pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        poll_max_attempts: 60,
        poll_interval: Duration::from_millis(1),
        submit_max_retries: 3,
        submit_retry_delay: Duration::from_millis(1),
        shutdown_timeout: Duration::from_secs(1),
        metrics_port: None,
        redis_url: None,
    }
}

pub fn http_error(status: u16, body: &str) -> ProviderError {
    ProviderError::Http {
        status,
        body: body.to_string(),
    }
}

/// Wait until the stored job is terminal.
pub async fn wait_for_terminal(store: &dyn JobStore, id: &JobId) -> Job {
    for _ in 0..1000 {
        let job = store.get(id).await.unwrap();
        if job.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("job {} never reached a terminal status", id);
}

/// Enhancer that appends a fixed suffix, or echoes its input when `fail` is set.
#[derive(Default)]
pub struct FakeEnhancer {
    pub fail: bool,
    pub analysis: Mutex<Option<ImageAnalysis>>,
    pub storyboard_error: Mutex<Option<ProviderError>>,
    pub enhance_calls: Mutex<Vec<(String, EnhanceContext)>>,
}

impl FakeEnhancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_analysis(self, analysis: ImageAnalysis) -> Self {
        *self.analysis.lock().unwrap() = Some(analysis);
        self
    }

    pub fn enhanced_inputs(&self) -> Vec<(String, EnhanceContext)> {
        self.enhance_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptEnhancer for FakeEnhancer {
    async fn enhance(&self, text: &str, context: EnhanceContext) -> String {
        self.enhance_calls
            .lock()
            .unwrap()
            .push((text.to_string(), context));
        if self.fail {
            text.to_string()
        } else {
            format!("{}{}", text, ENHANCED_SUFFIX)
        }
    }

    async fn analyze_image(&self, _image_path: &str) -> ImageAnalysis {
        self.analysis
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ImageAnalysis::analyzed("A red kite over a green hill"))
    }

    async fn generate_storyboard(
        &self,
        script: &str,
        num_scenes: u32,
    ) -> ProviderResult<Storyboard> {
        if let Some(err) = self.storyboard_error.lock().unwrap().take() {
            return Err(err);
        }
        let scenes = (0..num_scenes)
            .map(|i| StoryboardScene {
                scene_number: 0,
                description: format!("Scene {}", i + 1),
                camera: "wide".into(),
                duration_secs: 4,
                transition: "cut".into(),
            })
            .collect();
        Ok(Storyboard::new(script, scenes))
    }
}

/// Submission that blocks until released, to cancel a job mid-submit.
pub struct SubmitGate {
    pub entered: Notify,
    pub release: Notify,
}

impl SubmitGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

/// Video provider driven by scripted responses.
///
/// Submissions pop from `submits` (default: accepted as `kling-1`); polls pop
/// from `polls` (default: still processing).
#[derive(Default)]
pub struct FakeSynthesizer {
    pub submits: Mutex<VecDeque<ProviderResult<SubmitReceipt>>>,
    pub polls: Mutex<VecDeque<ProviderResult<ProviderStatus>>>,
    pub cancel_accepts: bool,
    pub gate: Option<Arc<SubmitGate>>,
    pub submit_calls: AtomicU32,
    pub poll_calls: AtomicU32,
    pub cancel_calls: AtomicU32,
    pub submitted_prompts: Mutex<Vec<Option<String>>>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self {
            cancel_accepts: true,
            ..Default::default()
        }
    }

    pub fn with_gate(mut self, gate: Arc<SubmitGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn script_submit(&self, result: ProviderResult<SubmitReceipt>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub fn script_poll(&self, result: ProviderResult<ProviderStatus>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> u32 {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    async fn next_submit(&self, prompt: Option<&str>) -> ProviderResult<SubmitReceipt> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted_prompts
            .lock()
            .unwrap()
            .push(prompt.map(str::to_string));

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(SubmitReceipt {
                    provider_job_id: "kling-1".into(),
                    estimated_seconds: 120,
                })
            })
    }
}

#[async_trait]
impl VideoSynthesizer for FakeSynthesizer {
    async fn submit_text_to_video(
        &self,
        prompt: &str,
        _params: &TextToVideoParams,
    ) -> ProviderResult<SubmitReceipt> {
        self.next_submit(Some(prompt)).await
    }

    async fn submit_image_to_video(
        &self,
        _image_path: &str,
        prompt: Option<&str>,
        _params: &ImageToVideoParams,
    ) -> ProviderResult<SubmitReceipt> {
        self.next_submit(prompt).await
    }

    async fn poll_status(&self, _provider_job_id: &str) -> ProviderResult<ProviderStatus> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ProviderStatus::processing(10)))
    }

    async fn cancel(&self, _provider_job_id: &str) -> ProviderResult<bool> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cancel_accepts)
    }
}
