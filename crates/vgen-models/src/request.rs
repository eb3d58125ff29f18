//! Inbound generation requests, validated before any job is created.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::params::{
    AspectRatio, CameraMovement, ImageToVideoParams, MotionIntensity, QualityLevel,
    TextToVideoParams, VideoStyle, DEFAULT_DURATION_SECS,
};

/// Image extensions accepted for image-to-video.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

fn default_duration() -> u32 {
    DEFAULT_DURATION_SECS
}

/// Text-to-video request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct TextJobRequest {
    #[validate(length(min = 1, message = "owner_id is required"))]
    pub owner_id: String,

    #[validate(length(min = 1, max = 1000))]
    pub prompt: String,

    #[serde(default = "default_duration")]
    #[validate(range(min = 3, max = 30))]
    pub duration_secs: u32,

    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<VideoStyle>,

    #[serde(default)]
    pub quality: QualityLevel,
}

impl TextJobRequest {
    pub fn new(owner_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            prompt: prompt.into(),
            duration_secs: DEFAULT_DURATION_SECS,
            aspect_ratio: AspectRatio::default(),
            style: None,
            quality: QualityLevel::default(),
        }
    }

    /// Run the derived bounds checks plus the blank-prompt check.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_default();
        if let Err(e) = validate_not_blank(&self.prompt) {
            errors.add("prompt", e);
        }
        into_result(errors)
    }

    pub fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn params(&self) -> TextToVideoParams {
        TextToVideoParams {
            duration_secs: self.duration_secs,
            aspect_ratio: self.aspect_ratio,
            style: self.style,
            quality: self.quality,
        }
    }
}

/// Image-to-video request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ImageJobRequest {
    #[validate(length(min = 1, message = "owner_id is required"))]
    pub owner_id: String,

    /// Path of the uploaded source image
    pub image_path: String,

    /// Optional motion description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000))]
    pub prompt: Option<String>,

    #[serde(default = "default_duration")]
    #[validate(range(min = 3, max = 30))]
    pub duration_secs: u32,

    #[serde(default)]
    pub motion_intensity: MotionIntensity,

    #[serde(default)]
    pub camera_movement: CameraMovement,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl ImageJobRequest {
    pub fn new(owner_id: impl Into<String>, image_path: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            image_path: image_path.into(),
            prompt: None,
            duration_secs: DEFAULT_DURATION_SECS,
            motion_intensity: MotionIntensity::default(),
            camera_movement: CameraMovement::default(),
            direction: None,
        }
    }

    /// Run the derived bounds checks plus the image type check.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_default();
        if let Err(e) = validate_image_path(&self.image_path) {
            errors.add("image_path", e);
        }
        into_result(errors)
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Prompt with surrounding whitespace removed; blank prompts count as absent.
    pub fn trimmed_prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn params(&self) -> ImageToVideoParams {
        ImageToVideoParams {
            duration_secs: self.duration_secs,
            motion_intensity: self.motion_intensity,
            camera_movement: self.camera_movement,
            direction: self.direction.clone(),
        }
    }
}

/// Storyboard request: split a script into scenes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct StoryboardRequest {
    #[validate(length(min = 10, max = 5000))]
    pub script: String,

    #[serde(default = "default_num_scenes")]
    #[validate(range(min = 2, max = 10))]
    pub num_scenes: u32,
}

fn default_num_scenes() -> u32 {
    4
}

fn into_result(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Prompt cannot be empty".into()));
    }
    Ok(())
}

fn validate_image_path(value: &str) -> Result<(), ValidationError> {
    let extension = Path::new(value)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension {
        Some(ext) if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ValidationError::new("image_type").with_message(
            format!(
                "Unsupported image type, expected one of: {}",
                ALLOWED_IMAGE_EXTENSIONS.join(", ")
            )
            .into(),
        )),
    }
}
