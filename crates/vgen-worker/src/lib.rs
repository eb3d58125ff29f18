//! Video generation worker.
//!
//! This crate handles:
//! - Validating generation requests and creating job records
//! - Enhancing prompts and analyzing images before submission
//! - Submitting renders to the video provider with bounded retries
//! - Polling render status in background tasks until each job settles
//! - Cancelling jobs and resuming polling after a restart

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod poller;
pub mod retry;
pub mod service;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::VideoGenerator;
pub use poller::{PollOutcome, PollerConfig, StatusPoller};
pub use retry::{retry_async, retry_async_if, FailureTracker, RetryConfig, RetryResult};
pub use service::JobService;
