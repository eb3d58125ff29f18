//! Multi-scene storyboards derived from a script.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Scene length used when the model gives none.
pub const DEFAULT_SCENE_DURATION_SECS: u32 = 3;

fn default_transition() -> String {
    "cut".to_string()
}

fn default_scene_duration() -> u32 {
    DEFAULT_SCENE_DURATION_SECS
}

/// One scene of a storyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoryboardScene {
    /// 1-based position in the sequence
    pub scene_number: u32,
    /// Visual description of the scene
    pub description: String,
    /// Camera angle or movement
    #[serde(default)]
    pub camera: String,
    #[serde(default = "default_scene_duration")]
    pub duration_secs: u32,
    /// Transition into the next scene
    #[serde(default = "default_transition")]
    pub transition: String,
}

/// A script split into scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Storyboard {
    pub script: String,
    pub scenes: Vec<StoryboardScene>,
    pub total_duration_secs: u32,
}

impl Storyboard {
    /// Build a storyboard, renumbering scenes in order and summing durations.
    pub fn new(script: impl Into<String>, mut scenes: Vec<StoryboardScene>) -> Self {
        for (i, scene) in scenes.iter_mut().enumerate() {
            scene.scene_number = i as u32 + 1;
            if scene.duration_secs == 0 {
                scene.duration_secs = DEFAULT_SCENE_DURATION_SECS;
            }
        }
        let total_duration_secs = scenes.iter().map(|s| s.duration_secs).sum();

        Self {
            script: script.into(),
            scenes,
            total_duration_secs,
        }
    }

    pub fn num_scenes(&self) -> usize {
        self.scenes.len()
    }
}
