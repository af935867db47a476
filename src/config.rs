use anyhow::{Context, Result};
use serde::Deserialize;

use crate::session::SessionConfig;
use crate::transport::Lang;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub asr: AsrConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AsrConfig {
    pub socket_url: String,
    pub app_key: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub sign_endpoint: Option<String>,
    #[serde(default)]
    pub lang: Lang,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Generated per run when absent
    #[serde(default)]
    pub udid: Option<String>,
    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Length of each replayed recorder buffer
    #[serde(default = "default_buffer_duration_ms")]
    pub buffer_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_duration_ms: default_buffer_duration_ms(),
        }
    }
}

fn default_user_id() -> String {
    "loqa-asr".to_string()
}

fn default_retry_step_ms() -> u64 {
    200
}

fn default_buffer_duration_ms() -> u64 {
    100
}

impl Config {
    /// Load `path` (extension optional) with `LOQA_ASR__SECTION__KEY` overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LOQA_ASR").separator("__"))
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();

        SessionConfig {
            session_id: defaults.session_id,
            socket_url: self.asr.socket_url.clone(),
            app_key: self.asr.app_key.clone(),
            secret: self.asr.secret.clone(),
            sign_endpoint: self.asr.sign_endpoint.clone(),
            lang: self.asr.lang,
            user_id: self.asr.user_id.clone(),
            udid: self.asr.udid.clone().unwrap_or(defaults.udid),
            retry_step_ms: self.asr.retry_step_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_applies_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "loqa-asr"

[service.http]
bind = "127.0.0.1"
port = 3000

[asr]
socket_url = "wss://asr.example.com/v1/ws"
app_key = "key"
secret = "secret"
lang = "cantonese"
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.service.http.port, 3000);
        assert_eq!(config.audio.buffer_duration_ms, 100);
        assert_eq!(config.asr.retry_step_ms, 200);

        let session = config.session_config();
        assert_eq!(session.lang, Lang::Cantonese);
        assert_eq!(session.user_id, "loqa-asr");
        assert!(!session.udid.is_empty());
        assert!(session.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("/nonexistent/loqa-asr").is_err());
    }
}
