//! External provider gateways.
//!
//! - [`GeminiClient`]: prompt enhancement, image analysis and storyboards
//! - [`KlingClient`]: HMAC-signed video synthesis (submit, poll, cancel)
//!
//! Both sit behind the [`PromptEnhancer`] and [`VideoSynthesizer`] traits so
//! the orchestrator can be driven by fakes in tests.

pub mod error;
pub mod gemini;
pub mod kling;
pub mod signing;
pub mod traits;

pub use error::{ProviderError, ProviderResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use kling::{KlingClient, KlingConfig};
pub use signing::RequestSigner;
pub use traits::{
    EnhanceContext, ImageAnalysis, PromptEnhancer, ProviderState, ProviderStatus, SubmitReceipt,
    VideoSynthesizer, FALLBACK_IMAGE_DESCRIPTION,
};
