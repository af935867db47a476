use std::sync::Arc;

/// Credentials the sign endpoint signs with
#[derive(Debug, Clone)]
pub struct SignCredentials {
    /// The only app key this endpoint signs for
    pub app_key: String,
    /// Shared secret; never leaves the server
    pub secret: Option<String>,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<SignCredentials>,
}

impl AppState {
    pub fn new(app_key: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            credentials: Arc::new(SignCredentials {
                app_key: app_key.into(),
                secret,
            }),
        }
    }
}
