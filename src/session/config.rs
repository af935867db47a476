use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::SessionError;
use crate::transport::Lang;

/// Configuration for a recognition session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session identifier used in logs (e.g., "asr-3f2c...")
    pub session_id: String,

    /// Recognition socket endpoint (ws:// or wss://)
    pub socket_url: String,

    /// Application key sent in the URL and the start frame
    pub app_key: String,

    /// Shared secret for local signing
    pub secret: Option<String>,

    /// Backend sign endpoint, used when no secret is configured
    pub sign_endpoint: Option<String>,

    /// Recognition language
    pub lang: Lang,

    /// User id sent in the start frame
    pub user_id: String,

    /// Device id sent in the start frame
    pub udid: String,

    /// Backoff step: the n-th consecutive failure waits n * step
    /// Default: 200ms
    pub retry_step_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("asr-{}", uuid::Uuid::new_v4()),
            socket_url: "ws://localhost:8080/v1/asr".to_string(),
            app_key: String::new(),
            secret: None,
            sign_endpoint: None,
            lang: Lang::Cn,
            user_id: "loqa-asr".to_string(),
            udid: uuid::Uuid::new_v4().to_string(),
            retry_step_ms: 200,
        }
    }
}

impl SessionConfig {
    pub fn retry_step(&self) -> Duration {
        Duration::from_millis(self.retry_step_ms)
    }

    /// Check the configuration and return the parsed socket URL
    pub fn validate(&self) -> Result<Url, SessionError> {
        let url = Url::parse(&self.socket_url).map_err(|e| {
            SessionError::Config(format!("invalid socket_url {:?}: {}", self.socket_url, e))
        })?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(SessionError::Config(format!(
                "socket_url must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }

        if self.app_key.is_empty() {
            return Err(SessionError::Config("app_key must not be empty".to_string()));
        }

        let has_secret = self.secret.as_deref().is_some_and(|s| !s.is_empty());
        let has_endpoint = self.sign_endpoint.as_deref().is_some_and(|e| !e.is_empty());
        if !has_secret && !has_endpoint {
            return Err(SessionError::Config(
                "either secret or sign_endpoint must be set".to_string(),
            ));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SessionConfig {
        SessionConfig {
            app_key: "key".to_string(),
            secret: Some("secret".to_string()),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.retry_step(), Duration::from_millis(200));
        assert_eq!(config.lang, Lang::Cn);
        assert!(config.session_id.starts_with("asr-"));
    }

    #[test]
    fn test_validate_accepts_secret_or_endpoint() {
        assert!(valid().validate().is_ok());

        let remote = SessionConfig {
            secret: None,
            sign_endpoint: Some("http://localhost:3000/api/unisound".to_string()),
            ..valid()
        };
        assert!(remote.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let no_sign = SessionConfig {
            secret: Some(String::new()),
            ..valid()
        };
        assert!(matches!(no_sign.validate(), Err(SessionError::Config(_))));

        let http = SessionConfig {
            socket_url: "http://localhost/asr".to_string(),
            ..valid()
        };
        assert!(http.validate().is_err());

        let garbage = SessionConfig {
            socket_url: "not a url".to_string(),
            ..valid()
        };
        assert!(garbage.validate().is_err());

        let no_key = SessionConfig {
            app_key: String::new(),
            ..valid()
        };
        assert!(no_key.validate().is_err());
    }
}
