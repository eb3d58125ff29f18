//! Worker configuration.

use std::time::Duration;

use crate::poller::PollerConfig;
use crate::retry::RetryConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Status polls per render before the job times out
    pub poll_max_attempts: u32,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Extra submission attempts after a retryable provider error
    pub submit_max_retries: u32,
    /// Delay before the first submission retry
    pub submit_retry_delay: Duration,
    /// Bounded wait for pollers on shutdown
    pub shutdown_timeout: Duration,
    /// Prometheus listener port; metrics are disabled when unset
    pub metrics_port: Option<u16>,
    /// Redis job store; in-memory when unset
    pub redis_url: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_max_attempts: 60,
            poll_interval: Duration::from_secs(10), // 10 minute budget per render
            submit_max_retries: 3,
            submit_retry_delay: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            metrics_port: None,
            redis_url: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_max_attempts: env_parse("POLL_MAX_ATTEMPTS").unwrap_or(defaults.poll_max_attempts),
            poll_interval: env_parse("POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            submit_max_retries: env_parse("SUBMIT_MAX_RETRIES")
                .unwrap_or(defaults.submit_max_retries),
            submit_retry_delay: env_parse("SUBMIT_RETRY_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.submit_retry_delay),
            shutdown_timeout: env_parse("SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            metrics_port: env_parse("METRICS_PORT"),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            max_attempts: self.poll_max_attempts.max(1),
            interval: self.poll_interval,
        }
    }

    /// Retry policy for provider submission.
    pub fn submit_retry(&self) -> RetryConfig {
        RetryConfig::new("provider_submit")
            .with_max_retries(self.submit_max_retries)
            .with_base_delay(self.submit_retry_delay)
            .with_max_delay(self.submit_retry_delay.saturating_mul(4))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
