//! Per-connection signatures for the recognition socket
//!
//! The socket URL carries `sign = SHA256(appkey || time || secret)` in
//! uppercase hex. Clients that hold the secret compute it locally; clients
//! that don't ask a backend endpoint to sign for them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{SessionError, SignError};
use crate::session::SessionConfig;

/// Supplies the signature for one channel
#[async_trait]
pub trait SignProvider: Send + Sync {
    async fn sign(&self, app_key: &str, time: i64) -> Result<String, SignError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Uppercase hex SHA-256 of `key || time || secret`
pub fn compute_sign(app_key: &str, time: i64, secret: &str) -> String {
    let digest = Sha256::digest(format!("{}{}{}", app_key, time, secret).as_bytes());

    let mut sign = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(sign, "{:02X}", byte);
    }
    sign
}

/// Signs with a locally configured secret
pub struct LocalSigner {
    secret: String,
}

impl LocalSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl SignProvider for LocalSigner {
    async fn sign(&self, app_key: &str, time: i64) -> Result<String, SignError> {
        Ok(compute_sign(app_key, time, &self.secret))
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Body of a sign request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    pub key: String,
    pub time: i64,
}

/// Successful sign response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignResponse {
    pub sign: String,
}

/// Failed sign response: `{"error": {"code": ...}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignErrorResponse {
    #[serde(default)]
    pub error: Option<SignErrorBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl SignErrorResponse {
    pub fn with_code(code: &str) -> Self {
        Self {
            error: Some(SignErrorBody {
                code: Some(serde_json::Value::String(code.to_string())),
            }),
        }
    }

    fn code(&self) -> Option<String> {
        match self.error.as_ref()?.code.as_ref()? {
            serde_json::Value::String(code) => Some(code.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Asks a backend endpoint (`POST {key, time}`) for the signature
pub struct RemoteSigner {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteSigner {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SignProvider for RemoteSigner {
    async fn sign(&self, app_key: &str, time: i64) -> Result<String, SignError> {
        debug!("Requesting signature from {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SignRequest {
                key: app_key.to_string(),
                time,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The body may not even be JSON; the status alone is enough to fail
            let body: SignErrorResponse = response.json().await.unwrap_or_default();
            return Err(SignError::Rejected {
                status: status.as_u16(),
                code: body.code(),
            });
        }

        let body: SignResponse = response.json().await?;
        if body.sign.is_empty() {
            return Err(SignError::MissingSign);
        }

        Ok(body.sign)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Pick the signer for a session: local secret first, then the sign endpoint
pub fn signer_for(config: &SessionConfig) -> Result<Arc<dyn SignProvider>, SessionError> {
    if let Some(secret) = config.secret.as_deref().filter(|s| !s.is_empty()) {
        info!("Signing channels locally");
        return Ok(Arc::new(LocalSigner::new(secret)));
    }

    if let Some(endpoint) = config.sign_endpoint.as_deref().filter(|e| !e.is_empty()) {
        info!("Signing channels via {}", endpoint);
        return Ok(Arc::new(RemoteSigner::new(endpoint)));
    }

    Err(SessionError::Config(
        "either asr.secret or asr.sign_endpoint must be set".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_sign_is_uppercase_sha256() {
        // echo -n "key1700000000000secret" | sha256sum
        let sign = compute_sign("key", 1700000000000, "secret");
        assert_eq!(sign, "EE412F504F93D283888979AB4F37E98BEB471243575D468A4048C57285ABAD84");
    }

    #[test]
    fn test_compute_sign_depends_on_time() {
        assert_ne!(compute_sign("k", 1, "s"), compute_sign("k", 2, "s"));
    }

    #[test]
    fn test_error_response_code_variants() {
        let body: SignErrorResponse =
            serde_json::from_str(r#"{"error":{"code":"invalid_key"}}"#).unwrap();
        assert_eq!(body.code().as_deref(), Some("invalid_key"));

        let body: SignErrorResponse = serde_json::from_str(r#"{"error":{"code":42}}"#).unwrap();
        assert_eq!(body.code().as_deref(), Some("42"));

        let body: SignErrorResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(body.code(), None);
    }

    #[tokio::test]
    async fn test_local_signer_matches_compute_sign() {
        let signer = LocalSigner::new("secret");
        let sign = signer.sign("key", 42).await.unwrap();
        assert_eq!(sign, compute_sign("key", 42, "secret"));
    }
}
