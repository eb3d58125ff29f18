//! Kling video-synthesis client.
//!
//! Every request carries an HMAC signature computed over the exact body
//! string that is sent, see [`RequestSigner`].

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vgen_models::{ImageToVideoParams, TextToVideoParams};

use crate::error::{ProviderError, ProviderResult};
use crate::signing::{RequestSigner, SignedHeaders};
use crate::traits::{ProviderState, ProviderStatus, SubmitReceipt, VideoSynthesizer};

const DEFAULT_BASE_URL: &str = "https://api.klingai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Estimate used when the provider omits one for text-to-video.
pub const DEFAULT_TEXT_ESTIMATE_SECS: u32 = 120;
/// Estimate used when the provider omits one for image-to-video.
pub const DEFAULT_IMAGE_ESTIMATE_SECS: u32 = 90;

const TEXT_TO_VIDEO_PATH: &str = "/generate/text-to-video";
const IMAGE_TO_VIDEO_PATH: &str = "/generate/image-to-video";

/// Configuration for the Kling client.
#[derive(Clone)]
pub struct KlingConfig {
    pub access_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for KlingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlingConfig")
            .field("access_key", &self.access_key)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl KlingConfig {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let access_key = std::env::var("KLING_API_ACCESS_KEY")
            .map_err(|_| ProviderError::config("KLING_API_ACCESS_KEY not configured"))?;
        let secret_key = std::env::var("KLING_API_SECRET_KEY")
            .map_err(|_| ProviderError::config("KLING_API_SECRET_KEY not configured"))?;

        Ok(Self {
            access_key,
            secret_key,
            base_url: std::env::var("KLING_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("KLING_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        })
    }
}

#[derive(Debug, Serialize)]
struct TextToVideoBody<'a> {
    prompt: &'a str,
    duration: u32,
    aspect_ratio: &'static str,
    quality: vgen_models::QualityLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ImageToVideoBody<'a> {
    image: String,
    duration: u32,
    motion_intensity: &'static str,
    camera_movement: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    motion_direction: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    estimated_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    error_message: Option<String>,
}

impl From<StatusResponse> for ProviderStatus {
    fn from(raw: StatusResponse) -> Self {
        let state = ProviderState::from_provider(raw.status.as_deref());
        let progress_pct = raw
            .progress
            .map(|p| p.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(0);

        ProviderStatus {
            state,
            progress_pct,
            result_ref: raw.video_url.filter(|u| !u.trim().is_empty()),
            duration_secs: raw.duration,
            error_msg: raw.error_message.filter(|m| !m.trim().is_empty()),
        }
    }
}

/// Kling REST client.
pub struct KlingClient {
    http: Client,
    signer: RequestSigner,
    config: KlingConfig,
}

impl KlingClient {
    pub fn new(config: KlingConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;
        let signer = RequestSigner::new(&config.access_key, &config.secret_key);

        Ok(Self {
            http,
            signer,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(KlingConfig::from_env()?)
    }

    pub fn config(&self) -> &KlingConfig {
        &self.config
    }

    /// Build a signed request. `body` is both signed and sent verbatim.
    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: String,
    ) -> ProviderResult<reqwest::Request> {
        let signed = self.signer.sign(method.as_str(), path, &body)?;
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let mut request = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json")
            .header(SignedHeaders::ACCESS_KEY, &signed.access_key)
            .header(SignedHeaders::TIMESTAMP, &signed.timestamp)
            .header(SignedHeaders::SIGNATURE, &signed.signature);
        if !body.is_empty() {
            request = request.body(body);
        }

        Ok(request.build()?)
    }

    async fn send(&self, method: Method, path: &str, body: String) -> ProviderResult<reqwest::Response> {
        debug!(method = %method, path, "Calling Kling");
        let request = self.build_request(method, path, body)?;
        Ok(self.http.execute(request).await?)
    }

    /// Fail with the status and body on any non-2xx response.
    async fn check(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Http { status, body })
    }

    async fn submit(
        &self,
        path: &str,
        body: String,
        default_estimate: u32,
    ) -> ProviderResult<SubmitReceipt> {
        let response = Self::check(self.send(Method::POST, path, body).await?).await?;
        let raw: SubmitResponse = response.json().await?;

        let provider_job_id = raw
            .job_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ProviderError::invalid_response("Submit response missing job_id"))?;
        let estimated_seconds = raw
            .estimated_time
            .filter(|t| t.is_finite() && *t >= 0.0)
            .map(|t| t.round() as u32)
            .unwrap_or(default_estimate);

        Ok(SubmitReceipt {
            provider_job_id,
            estimated_seconds,
        })
    }
}

#[async_trait]
impl VideoSynthesizer for KlingClient {
    async fn submit_text_to_video(
        &self,
        prompt: &str,
        params: &TextToVideoParams,
    ) -> ProviderResult<SubmitReceipt> {
        let body = serde_json::to_string(&TextToVideoBody {
            prompt,
            duration: params.duration_secs,
            aspect_ratio: params.aspect_ratio.as_str(),
            quality: params.quality,
            style: params.style.map(|s| s.as_str()),
        })?;

        let receipt = self
            .submit(TEXT_TO_VIDEO_PATH, body, DEFAULT_TEXT_ESTIMATE_SECS)
            .await
            .inspect_err(|e| warn!(error = %e, "Kling text-to-video submission failed"))?;

        info!(provider_job_id = %receipt.provider_job_id, "Text-to-video job created");
        Ok(receipt)
    }

    async fn submit_image_to_video(
        &self,
        image_path: &str,
        prompt: Option<&str>,
        params: &ImageToVideoParams,
    ) -> ProviderResult<SubmitReceipt> {
        let bytes = tokio::fs::read(image_path).await?;

        let body = serde_json::to_string(&ImageToVideoBody {
            image: STANDARD.encode(&bytes),
            duration: params.duration_secs,
            motion_intensity: params.motion_intensity.as_str(),
            camera_movement: params.camera_movement.as_str(),
            prompt,
            motion_direction: params.direction.as_deref(),
        })?;

        let receipt = self
            .submit(IMAGE_TO_VIDEO_PATH, body, DEFAULT_IMAGE_ESTIMATE_SECS)
            .await
            .inspect_err(|e| warn!(error = %e, "Kling image-to-video submission failed"))?;

        info!(provider_job_id = %receipt.provider_job_id, "Image-to-video job created");
        Ok(receipt)
    }

    async fn poll_status(&self, provider_job_id: &str) -> ProviderResult<ProviderStatus> {
        let path = format!("/jobs/{}/status", provider_job_id);
        let response = Self::check(self.send(Method::GET, &path, String::new()).await?).await?;
        let raw: StatusResponse = response.json().await?;
        Ok(raw.into())
    }

    async fn cancel(&self, provider_job_id: &str) -> ProviderResult<bool> {
        let path = format!("/jobs/{}/cancel", provider_job_id);
        let response = self.send(Method::POST, &path, String::new()).await?;

        if response.status().is_success() {
            info!(provider_job_id, "Kling job cancelled");
            return Ok(true);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if status >= 500 {
            return Err(ProviderError::Http { status, body });
        }
        warn!(provider_job_id, status, body = %body, "Kling refused cancellation");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = KlingConfig::new("ak", "sk-secret");
        assert_eq!(config.base_url, "https://api.klingai.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }

    #[test]
    fn test_status_mapping() {
        let raw: StatusResponse = serde_json::from_str(
            r#"{"status":"pending","progress":12.4,"video_url":"","error_message":null}"#,
        )
        .unwrap();
        let status = ProviderStatus::from(raw);
        assert_eq!(status.state, ProviderState::Processing);
        assert_eq!(status.progress_pct, 12);
        assert!(status.result_ref.is_none());

        let raw: StatusResponse = serde_json::from_str(
            r#"{"status":"completed","progress":100,"video_url":"https://x/video.mp4","duration":5.2}"#,
        )
        .unwrap();
        let status = ProviderStatus::from(raw);
        assert_eq!(status.state, ProviderState::Completed);
        assert_eq!(status.result_ref.as_deref(), Some("https://x/video.mp4"));
        assert_eq!(status.duration_secs, Some(5.2));
    }

    #[test]
    fn test_request_signature_covers_sent_body() {
        let client = KlingClient::new(KlingConfig::new("ak", "sk")).unwrap();
        let body = r#"{"prompt":"a cat"}"#.to_string();
        let request = client
            .build_request(Method::POST, TEXT_TO_VIDEO_PATH, body.clone())
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://api.klingai.com/v1/generate/text-to-video"
        );
        let headers = request.headers();
        assert_eq!(headers[SignedHeaders::ACCESS_KEY], "ak");
        let timestamp = headers[SignedHeaders::TIMESTAMP].to_str().unwrap();
        let signature = headers[SignedHeaders::SIGNATURE].to_str().unwrap();

        let sent = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(sent, body.as_bytes());
        assert!(RequestSigner::new("ak", "sk").verify(
            "POST",
            TEXT_TO_VIDEO_PATH,
            timestamp,
            &body,
            signature
        ));
    }

    #[test]
    fn test_bodyless_request_signs_empty_string() {
        let client = KlingClient::new(KlingConfig::new("ak", "sk")).unwrap();
        let request = client
            .build_request(Method::GET, "/jobs/p1/status", String::new())
            .unwrap();
        assert!(request.body().is_none());

        let headers = request.headers();
        let timestamp = headers[SignedHeaders::TIMESTAMP].to_str().unwrap();
        let signature = headers[SignedHeaders::SIGNATURE].to_str().unwrap();
        assert!(RequestSigner::new("ak", "sk").verify(
            "GET",
            "/jobs/p1/status",
            timestamp,
            "",
            signature
        ));
    }

    #[test]
    fn test_text_body_shape() {
        let params = TextToVideoParams::default();
        let body = serde_json::to_value(TextToVideoBody {
            prompt: "a cat",
            duration: params.duration_secs,
            aspect_ratio: params.aspect_ratio.as_str(),
            quality: params.quality,
            style: None,
        })
        .unwrap();
        assert_eq!(body["prompt"], "a cat");
        assert_eq!(body["duration"], 5);
        assert_eq!(body["aspect_ratio"], "16:9");
        assert!(body.get("style").is_none());
    }
}
