//! Generation parameters: aspect ratio, style, quality and motion settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::job::InputKind;

/// Default clip length in seconds.
pub const DEFAULT_DURATION_SECS: u32 = 5;

/// Supported output aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    /// Landscape 16:9
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// Portrait 9:16 (TikTok, Shorts, Reels)
    #[serde(rename = "9:16")]
    Portrait,
    /// Square 1:1
    #[serde(rename = "1:1")]
    Square,
    /// Classic 4:3
    #[serde(rename = "4:3")]
    Classic,
    /// Ultra-wide 21:9
    #[serde(rename = "21:9")]
    UltraWide,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Classic => "4:3",
            AspectRatio::UltraWide => "21:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ParamParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            "1:1" => Ok(AspectRatio::Square),
            "4:3" => Ok(AspectRatio::Classic),
            "21:9" => Ok(AspectRatio::UltraWide),
            other => Err(ParamParseError::AspectRatio(other.to_string())),
        }
    }
}

/// Visual style requested from the video provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoStyle {
    Realistic,
    Anime,
    Cartoon,
    Cinematic,
    Artistic,
    #[serde(rename = "3d")]
    ThreeD,
}

impl VideoStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStyle::Realistic => "realistic",
            VideoStyle::Anime => "anime",
            VideoStyle::Cartoon => "cartoon",
            VideoStyle::Cinematic => "cinematic",
            VideoStyle::Artistic => "artistic",
            VideoStyle::ThreeD => "3d",
        }
    }
}

impl fmt::Display for VideoStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Standard,
    #[default]
    High,
    Ultra,
}

/// How strongly a still image is animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionIntensity {
    Low,
    #[default]
    Medium,
    High,
}

impl MotionIntensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionIntensity::Low => "low",
            MotionIntensity::Medium => "medium",
            MotionIntensity::High => "high",
        }
    }
}

/// Camera movement applied to an animated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraMovement {
    #[default]
    Static,
    Pan,
    Zoom,
    Rotate,
    Tracking,
}

impl CameraMovement {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMovement::Static => "static",
            CameraMovement::Pan => "pan",
            CameraMovement::Zoom => "zoom",
            CameraMovement::Rotate => "rotate",
            CameraMovement::Tracking => "tracking",
        }
    }
}

/// Parameters for text-to-video generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextToVideoParams {
    /// Clip length in seconds
    pub duration_secs: u32,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<VideoStyle>,
    #[serde(default)]
    pub quality: QualityLevel,
}

impl Default for TextToVideoParams {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
            aspect_ratio: AspectRatio::default(),
            style: None,
            quality: QualityLevel::default(),
        }
    }
}

/// Parameters for image-to-video generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageToVideoParams {
    /// Clip length in seconds
    pub duration_secs: u32,
    #[serde(default)]
    pub motion_intensity: MotionIntensity,
    #[serde(default)]
    pub camera_movement: CameraMovement,
    /// Free-form motion direction hint (e.g. "left to right")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl Default for ImageToVideoParams {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
            motion_intensity: MotionIntensity::default(),
            camera_movement: CameraMovement::default(),
            direction: None,
        }
    }
}

/// Parameters of either generation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationParams {
    Text(TextToVideoParams),
    Image(ImageToVideoParams),
}

impl GenerationParams {
    pub fn kind(&self) -> InputKind {
        match self {
            GenerationParams::Text(_) => InputKind::Text,
            GenerationParams::Image(_) => InputKind::Image,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        match self {
            GenerationParams::Text(p) => p.duration_secs,
            GenerationParams::Image(p) => p.duration_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamParseError {
    #[error("Unsupported aspect ratio: {0}, expected one of 16:9, 9:16, 1:1, 4:3, 21:9")]
    AspectRatio(String),
}
