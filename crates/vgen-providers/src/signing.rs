//! HMAC request signing for the Kling API.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ProviderError, ProviderResult};

type HmacSha256 = Hmac<Sha256>;

/// Authentication headers for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub access_key: String,
    pub timestamp: String,
    pub signature: String,
}

impl SignedHeaders {
    pub const ACCESS_KEY: &'static str = "X-Access-Key";
    pub const TIMESTAMP: &'static str = "X-Timestamp";
    pub const SIGNATURE: &'static str = "X-Signature";
}

/// Signs requests with an access/secret key pair.
#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Base64 HMAC-SHA256 over `"{method}\n{path}\n{timestamp}\n{body}"`.
    pub fn signature(
        &self,
        method: &str,
        path: &str,
        timestamp: &str,
        body: &str,
    ) -> ProviderResult<String> {
        let string_to_sign = format!("{}\n{}\n{}\n{}", method, path, timestamp, body);

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ProviderError::config(format!("Invalid HMAC key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Sign a request at the given unix timestamp.
    pub fn sign_at(
        &self,
        method: &str,
        path: &str,
        body: &str,
        unix_secs: i64,
    ) -> ProviderResult<SignedHeaders> {
        let timestamp = unix_secs.to_string();
        let signature = self.signature(method, path, &timestamp, body)?;

        Ok(SignedHeaders {
            access_key: self.access_key.clone(),
            timestamp,
            signature,
        })
    }

    /// Sign a request at the current time.
    pub fn sign(&self, method: &str, path: &str, body: &str) -> ProviderResult<SignedHeaders> {
        self.sign_at(method, path, body, chrono::Utc::now().timestamp())
    }

    /// Check a signature produced by [`RequestSigner::signature`].
    pub fn verify(
        &self,
        method: &str,
        path: &str,
        timestamp: &str,
        body: &str,
        signature: &str,
    ) -> bool {
        let Ok(expected) = STANDARD.decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret_key.as_bytes()) else {
            return false;
        };
        mac.update(format!("{}\n{}\n{}\n{}", method, path, timestamp, body).as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}
