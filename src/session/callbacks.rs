use chrono::Utc;
use std::sync::Mutex;

use super::stats::TranscriptSegment;
use crate::error::SessionError;

/// Caller-facing notifications
///
/// All methods are invoked from the session task, in event order. They must
/// not block.
pub trait SessionCallbacks: Send + Sync {
    /// A recognised segment; `is_partial` marks an interim hypothesis
    fn on_result_change(&self, _text: &str, _is_partial: bool) {}

    /// Recording status changed (also reported again on repeated start/stop)
    fn on_status_change(&self, _recording: bool) {}

    /// Raw PCM buffers captured since the previous callback
    fn on_buffer(&self, _buffers: &[Vec<i16>]) {}

    /// A failure the user should be told about (recorder, signing, config)
    fn on_error(&self, _error: &SessionError) {}
}

/// Callbacks that ignore everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl SessionCallbacks for NoopCallbacks {}

/// Collects final segments and tracks the latest partial hypothesis
#[derive(Debug, Default)]
pub struct TranscriptCollector {
    segments: Mutex<Vec<TranscriptSegment>>,
    partial: Mutex<Option<String>>,
}

impl TranscriptCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Final segments received so far
    pub fn segments(&self) -> Vec<TranscriptSegment> {
        self.segments
            .lock()
            .map(|segments| segments.clone())
            .unwrap_or_default()
    }

    /// The interim hypothesis not yet finalized
    pub fn partial(&self) -> Option<String> {
        self.partial.lock().ok().and_then(|p| p.clone())
    }

    /// Final segments joined with spaces
    pub fn text(&self) -> String {
        self.segments()
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SessionCallbacks for TranscriptCollector {
    fn on_result_change(&self, text: &str, is_partial: bool) {
        if is_partial {
            if let Ok(mut partial) = self.partial.lock() {
                *partial = Some(text.to_string());
            }
            return;
        }

        if let Ok(mut partial) = self.partial.lock() {
            *partial = None;
        }
        if let Ok(mut segments) = self.segments.lock() {
            segments.push(TranscriptSegment {
                text: text.to_string(),
                timestamp: Utc::now(),
                partial: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_tracks_partial_then_final() {
        let collector = TranscriptCollector::new();

        collector.on_result_change("hel", true);
        assert_eq!(collector.partial().as_deref(), Some("hel"));
        assert!(collector.segments().is_empty());

        collector.on_result_change("hello", false);
        assert_eq!(collector.partial(), None);
        assert_eq!(collector.segments().len(), 1);

        collector.on_result_change("world", false);
        assert_eq!(collector.text(), "hello world");
    }
}
