//! Stream a WAV file through a live recognition session
//!
//! Used by the `transcribe` command. The run ends when the file has been
//! replayed (plus a linger period for final results), when the caller
//! interrupts it, or when the session stops on its own after a recorder or
//! signing failure.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::audio::FileRecorderFactory;
use crate::error::SessionError;
use crate::session::{SessionCallbacks, SessionConfig, SessionController, SessionSnapshot};

/// Forwards every callback and records why the session gave up
pub struct StopSignal {
    inner: Arc<dyn SessionCallbacks>,
    stopped: Notify,
    error: Mutex<Option<String>>,
}

impl StopSignal {
    pub fn new(inner: Arc<dyn SessionCallbacks>) -> Self {
        Self {
            inner,
            stopped: Notify::new(),
            error: Mutex::new(None),
        }
    }

    /// Resolves once the session reported an error or `recording == false`
    pub async fn stopped(&self) {
        self.stopped.notified().await;
    }

    /// The last error reported by the session
    pub fn error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|e| e.clone())
    }
}

impl SessionCallbacks for StopSignal {
    fn on_result_change(&self, text: &str, is_partial: bool) {
        self.inner.on_result_change(text, is_partial);
    }

    fn on_status_change(&self, recording: bool) {
        self.inner.on_status_change(recording);
        if !recording {
            self.stopped.notify_one();
        }
    }

    fn on_buffer(&self, buffers: &[Vec<i16>]) {
        self.inner.on_buffer(buffers);
    }

    fn on_error(&self, error: &SessionError) {
        if let Ok(mut last) = self.error.lock() {
            *last = Some(error.to_string());
        }
        self.inner.on_error(error);
        // Surfaced errors are never retried, so the run cannot recover
        self.stopped.notify_one();
    }
}

/// Replay `file` through a session until it ends, fails or `interrupt` resolves
///
/// Returns the final session snapshot, or an error carrying the reported
/// failure when the session gave up.
pub async fn transcribe_file(
    config: SessionConfig,
    file: &Path,
    buffer_duration_ms: u64,
    linger: Duration,
    callbacks: Arc<dyn SessionCallbacks>,
    interrupt: impl Future<Output = ()>,
) -> Result<SessionSnapshot> {
    let recorders = Arc::new(FileRecorderFactory::new(file, buffer_duration_ms));
    let finished = recorders.finished();
    let signal = Arc::new(StopSignal::new(callbacks));

    let session = SessionController::with_defaults(
        config,
        recorders,
        Arc::clone(&signal) as Arc<dyn SessionCallbacks>,
    )
    .context("Failed to create session")?
    .spawn();

    info!("Streaming {}", file.display());
    session.start();

    let failure = tokio::select! {
        _ = finished.notified() => {
            info!("Audio finished, waiting {}s for final results", linger.as_secs());
            tokio::time::sleep(linger).await;
            None
        }
        _ = signal.stopped() => {
            Some(signal.error().unwrap_or_else(|| "session stopped".to_string()))
        }
        _ = interrupt => {
            info!("Interrupted");
            None
        }
    };

    session.stop();
    let snapshot = session.snapshot().await?;
    session.shutdown().await?;

    if let Some(reason) = failure {
        warn!("Transcription aborted: {}", reason);
        anyhow::bail!("Transcription of {} failed: {}", file.display(), reason);
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NoopCallbacks;

    #[tokio::test]
    async fn test_stop_signal_wakes_on_status_false() {
        let signal = StopSignal::new(Arc::new(NoopCallbacks));

        signal.on_status_change(true);
        signal.on_error(&SessionError::Recorder("no device".to_string()));
        signal.on_status_change(false);

        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .unwrap();
        assert_eq!(
            signal.error().as_deref(),
            Some("Recorder failed to start: no device")
        );
    }
}
