//! Shared data models for the VGen backend.
//!
//! This crate provides Serde-serializable types for:
//! - Generation jobs and their lifecycle state machine
//! - Generation parameters (aspect ratio, style, motion)
//! - Validated inbound requests
//! - Views returned to collaborators (summaries, details, pages)
//! - Storyboards

pub mod job;
pub mod params;
pub mod request;
pub mod storyboard;
pub mod view;

// Re-export common types
pub use job::{
    InputKind, Job, JobId, JobInput, JobOutput, JobStatus, JobUpdate, NewJob, TransitionError,
};
pub use params::{
    AspectRatio, CameraMovement, GenerationParams, ImageToVideoParams, MotionIntensity,
    QualityLevel, TextToVideoParams, VideoStyle,
};
pub use request::{ImageJobRequest, StoryboardRequest, TextJobRequest};
pub use storyboard::{Storyboard, StoryboardScene};
pub use view::{JobDetail, JobQuery, JobSummary, Page};
