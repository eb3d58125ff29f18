//! Provider gateway error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// HTTP status code, when the provider answered with an error status.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            ProviderError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Human-readable cause recorded as a job's error detail.
    ///
    /// For HTTP errors this is the provider's response body.
    pub fn detail(&self) -> String {
        match self {
            ProviderError::Http { status, body } if body.trim().is_empty() => {
                format!("Provider returned HTTP {}", status)
            }
            ProviderError::Http { body, .. } => body.trim().to_string(),
            other => other.to_string(),
        }
    }

    /// Network failures and 5xx responses are worth another attempt.
    ///
    /// An undecodable success body is not: the provider already accepted the
    /// request, so sending it again would start a second render.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(e) => !e.is_decode(),
            ProviderError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_detail_is_body() {
        let err = ProviderError::Http {
            status: 429,
            body: "quota exceeded".into(),
        };
        assert_eq!(err.detail(), "quota exceeded");
        assert_eq!(err.status(), Some(429));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_body_detail_mentions_status() {
        let err = ProviderError::Http {
            status: 502,
            body: String::new(),
        };
        assert_eq!(err.detail(), "Provider returned HTTP 502");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_non_http_errors_not_retryable() {
        assert!(!ProviderError::invalid_response("missing job_id").is_retryable());
        assert!(!ProviderError::config("no key").is_retryable());
    }
}
