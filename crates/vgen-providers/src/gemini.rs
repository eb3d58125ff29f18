//! Gemini client for prompt enhancement, image analysis and storyboards.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vgen_models::{Storyboard, StoryboardScene};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{EnhanceContext, ImageAnalysis, PromptEnhancer};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite"];
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the Gemini client.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub base_url: String,
    /// Models tried in order until one answers
    pub models: Vec<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("GOOGLE_AI_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| {
                ProviderError::config("GOOGLE_AI_API_KEY (or GEMINI_API_KEY) not configured")
            })?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(models) = std::env::var("GEMINI_MODELS") {
            let models: Vec<String> = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if !models.is_empty() {
                config.models = models;
            }
        }
        config.timeout = Duration::from_secs(
            std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct StoryboardPayload {
    scenes: Vec<SceneDraft>,
}

#[derive(Debug, Deserialize)]
struct SceneDraft {
    description: String,
    #[serde(default, alias = "camera_angle")]
    camera: String,
    #[serde(default, alias = "duration")]
    duration_secs: u32,
    #[serde(default)]
    transition: Option<String>,
}

impl From<SceneDraft> for StoryboardScene {
    fn from(draft: SceneDraft) -> Self {
        Self {
            scene_number: 0,
            description: draft.description,
            camera: draft.camera,
            duration_secs: draft.duration_secs,
            transition: draft
                .transition
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "cut".to_string()),
        }
    }
}

/// Gemini REST client.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        if config.models.is_empty() {
            return Err(ProviderError::config("at least one Gemini model is required"));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Run a request against each configured model until one succeeds.
    async fn generate(&self, parts: Vec<Part>, json: bool) -> ProviderResult<String> {
        let request = GeminiRequest {
            contents: vec![Content { parts }],
            generation_config: json.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        };

        let mut last_error = None;
        for model in &self.config.models {
            debug!(model = %model, "Calling Gemini");
            match self.call_model(model, &request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(model = %model, error = %e, "Gemini model failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::config("no Gemini models configured")))
    }

    async fn call_model(&self, model: &str, request: &GeminiRequest) -> ProviderResult<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::invalid_response("No content in Gemini response"))?;

        Ok(text.to_string())
    }
}

#[async_trait]
impl PromptEnhancer for GeminiClient {
    async fn enhance(&self, text: &str, context: EnhanceContext) -> String {
        match self
            .generate(vec![Part::Text { text: enhancement_prompt(text, context) }], false)
            .await
        {
            Ok(enhanced) => {
                info!(
                    context = %context,
                    original_len = text.len(),
                    enhanced_len = enhanced.len(),
                    "Enhanced prompt"
                );
                enhanced
            }
            Err(e) => {
                warn!(context = %context, error = %e, "Prompt enhancement failed, using original prompt");
                text.to_string()
            }
        }
    }

    async fn analyze_image(&self, image_path: &str) -> ImageAnalysis {
        let bytes = match tokio::fs::read(image_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(image_path, error = %e, "Could not read image for analysis");
                return ImageAnalysis::fallback(format!("Image not found: {}: {}", image_path, e));
            }
        };

        let parts = vec![
            Part::Text {
                text: ANALYSIS_PROMPT.to_string(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type_for(image_path).to_string(),
                    data: STANDARD.encode(&bytes),
                },
            },
        ];

        match self.generate(parts, false).await {
            Ok(description) => ImageAnalysis::analyzed(description),
            Err(e) => {
                warn!(image_path, error = %e, "Image analysis failed, using fallback description");
                ImageAnalysis::fallback(e.detail())
            }
        }
    }

    async fn generate_storyboard(
        &self,
        script: &str,
        num_scenes: u32,
    ) -> ProviderResult<Storyboard> {
        let text = self
            .generate(
                vec![Part::Text {
                    text: storyboard_prompt(script, num_scenes),
                }],
                true,
            )
            .await?;

        let payload: StoryboardPayload = serde_json::from_str(strip_code_fence(&text))?;
        if payload.scenes.is_empty() {
            return Err(ProviderError::invalid_response("Storyboard contained no scenes"));
        }

        let scenes = payload.scenes.into_iter().map(StoryboardScene::from).collect();
        let storyboard = Storyboard::new(script, scenes);
        info!(scenes = storyboard.num_scenes(), "Generated storyboard");
        Ok(storyboard)
    }
}

const ANALYSIS_PROMPT: &str = "Analyze this image for video generation. Provide:
1. A detailed description of the scene
2. Identified objects and subjects
3. Mood and atmosphere
4. Suggested motion or animation possibilities
5. Color palette and lighting

Format as a comprehensive description suitable for video generation.";

fn enhancement_prompt(prompt: &str, context: EnhanceContext) -> String {
    format!(
        "You are a creative director for AI video generation.
Context: {context}

Original prompt: {prompt}

Enhance this prompt to create a more detailed, cinematic description that will result in a high-quality AI-generated video.
Include:
- Visual style and mood
- Camera movements if relevant
- Lighting and atmosphere
- Key actions or transitions
- Color palette suggestions

Keep it concise but descriptive (max 150 words).
Return only the enhanced prompt, no explanations."
    )
}

fn storyboard_prompt(script: &str, num_scenes: u32) -> String {
    format!(
        r#"Create a {num_scenes}-scene storyboard from this script:
{script}

For each scene provide a visual description (about 50 words), a camera angle or movement,
a suggested duration in seconds and the transition to the next scene.

Return ONLY a single JSON object with this schema:
{{
  "scenes": [
    {{
      "description": "Visual description",
      "camera": "Camera angle or movement",
      "duration_secs": 3,
      "transition": "cut"
    }}
  ]
}}"#
    )
}

/// MIME type for an image path, defaulting to JPEG.
pub fn mime_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Strip a surrounding markdown code fence from a model response.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}
