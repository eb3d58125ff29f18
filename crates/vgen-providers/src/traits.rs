//! Provider seams used by the orchestrator and the poller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use vgen_models::{ImageToVideoParams, Storyboard, TextToVideoParams};

use crate::error::ProviderResult;

/// Description used when image analysis fails.
pub const FALLBACK_IMAGE_DESCRIPTION: &str = "An image to be animated";

/// What the prompt is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnhanceContext {
    #[serde(rename = "text-to-video")]
    TextToVideo,
    #[serde(rename = "image-to-video")]
    ImageToVideo,
}

impl EnhanceContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhanceContext::TextToVideo => "text-to-video",
            EnhanceContext::ImageToVideo => "image-to-video",
        }
    }
}

impl fmt::Display for EnhanceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of analyzing a source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub description: String,
    /// The description is the generic fallback
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageAnalysis {
    pub fn analyzed(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            degraded: false,
            error: None,
        }
    }

    pub fn fallback(error: impl Into<String>) -> Self {
        Self {
            description: FALLBACK_IMAGE_DESCRIPTION.to_string(),
            degraded: true,
            error: Some(error.into()),
        }
    }
}

/// Acknowledgement of an accepted render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub provider_job_id: String,
    pub estimated_seconds: u32,
}

/// Render state as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    Processing,
    Completed,
    Failed,
}

impl ProviderState {
    /// Map a raw provider status string; unknown values count as processing.
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("completed") => ProviderState::Completed,
            Some("failed") => ProviderState::Failed,
            _ => ProviderState::Processing,
        }
    }
}

/// One status observation of a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub state: ProviderState,
    pub progress_pct: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl ProviderStatus {
    pub fn processing(progress_pct: u8) -> Self {
        Self {
            state: ProviderState::Processing,
            progress_pct,
            result_ref: None,
            duration_secs: None,
            error_msg: None,
        }
    }

    pub fn completed(result_ref: impl Into<String>, duration_secs: Option<f64>) -> Self {
        Self {
            state: ProviderState::Completed,
            progress_pct: 100,
            result_ref: Some(result_ref.into()),
            duration_secs,
            error_msg: None,
        }
    }

    pub fn failed(error_msg: Option<String>) -> Self {
        Self {
            state: ProviderState::Failed,
            progress_pct: 0,
            result_ref: None,
            duration_secs: None,
            error_msg,
        }
    }
}

/// Language/vision model used to improve prompts and describe images.
#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    /// Rewrite a prompt for video generation.
    ///
    /// Never fails: on any provider error the input is returned unchanged.
    async fn enhance(&self, text: &str, context: EnhanceContext) -> String;

    /// Describe an image for animation.
    ///
    /// Never fails: on any error the fallback description is returned with
    /// `degraded` set.
    async fn analyze_image(&self, image_path: &str) -> ImageAnalysis;

    /// Split a script into a multi-scene storyboard.
    async fn generate_storyboard(&self, script: &str, num_scenes: u32)
        -> ProviderResult<Storyboard>;
}

/// Video-synthesis provider.
#[async_trait]
pub trait VideoSynthesizer: Send + Sync {
    async fn submit_text_to_video(
        &self,
        prompt: &str,
        params: &TextToVideoParams,
    ) -> ProviderResult<SubmitReceipt>;

    async fn submit_image_to_video(
        &self,
        image_path: &str,
        prompt: Option<&str>,
        params: &ImageToVideoParams,
    ) -> ProviderResult<SubmitReceipt>;

    async fn poll_status(&self, provider_job_id: &str) -> ProviderResult<ProviderStatus>;

    /// Ask the provider to stop a render. `Ok(false)` means the provider refused.
    async fn cancel(&self, provider_job_id: &str) -> ProviderResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping() {
        assert_eq!(ProviderState::from_provider(Some("pending")), ProviderState::Processing);
        assert_eq!(ProviderState::from_provider(Some("processing")), ProviderState::Processing);
        assert_eq!(ProviderState::from_provider(Some("COMPLETED")), ProviderState::Completed);
        assert_eq!(ProviderState::from_provider(Some("failed")), ProviderState::Failed);
        assert_eq!(ProviderState::from_provider(Some("queued")), ProviderState::Processing);
        assert_eq!(ProviderState::from_provider(None), ProviderState::Processing);
    }

    #[test]
    fn test_fallback_analysis() {
        let analysis = ImageAnalysis::fallback("file not found");
        assert!(analysis.degraded);
        assert_eq!(analysis.description, FALLBACK_IMAGE_DESCRIPTION);
    }

    #[test]
    fn test_context_names() {
        assert_eq!(EnhanceContext::TextToVideo.to_string(), "text-to-video");
        assert_eq!(EnhanceContext::ImageToVideo.as_str(), "image-to-video");
    }
}
