//! Error types for loqa-asr.
//!
//! Only local, non-transient failures are represented here. Transport errors
//! are absorbed by the session's retry policy and never reach the caller.

use thiserror::Error;

/// Failures surfaced to the caller through `SessionCallbacks::on_error`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Recorder failed to start: {0}")]
    Recorder(String),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("Invalid session configuration: {0}")]
    Config(String),
}

/// Failures obtaining a per-connection signature.
#[derive(Error, Debug)]
pub enum SignError {
    #[error("Sign request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The sign endpoint answered with a non-success status.
    #[error("{}", code.as_deref().unwrap_or("asr sign error"))]
    Rejected { status: u16, code: Option<String> },

    #[error("Sign response did not contain a signature")]
    MissingSign,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_display() {
        let error = SessionError::Recorder("permission denied".to_string());
        assert_eq!(error.to_string(), "Recorder failed to start: permission denied");
    }

    #[test]
    fn test_rejected_uses_server_code() {
        let error = SignError::Rejected {
            status: 403,
            code: Some("invalid_key".to_string()),
        };
        assert_eq!(error.to_string(), "invalid_key");
    }

    #[test]
    fn test_rejected_without_code_falls_back() {
        let error = SignError::Rejected {
            status: 500,
            code: None,
        };
        assert_eq!(error.to_string(), "asr sign error");
    }

    #[test]
    fn test_sign_error_is_transparent_in_session_error() {
        let error: SessionError = SignError::MissingSign.into();
        assert_eq!(
            error.to_string(),
            "Sign response did not contain a signature"
        );
    }
}
