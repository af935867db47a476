use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::state::SessionState;
use crate::transport::{ChannelId, ReadyState};

/// Cumulative counters for a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    /// When the session was first started
    pub started_at: Option<DateTime<Utc>>,

    /// Channels created (including ones that never opened)
    pub channels_created: usize,

    /// Channels that reached the open state
    pub channels_opened: usize,

    /// Backoff restarts scheduled
    pub retries_scheduled: usize,

    /// Audio frames sent over an open channel
    pub frames_sent: usize,

    /// Audio callbacks dropped because no channel was open
    pub frames_dropped: usize,

    /// PCM bytes sent
    pub bytes_sent: usize,

    /// Transcript deltas received
    pub transcript_segments_count: usize,

    /// Most recent server-assigned session id
    pub last_sid: Option<String>,
}

/// The current channel as seen by the session
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub id: ChannelId,
    pub ready_state: ReadyState,
    pub sid: Option<String>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,

    /// Recording status as last reported to the caller
    pub is_recording: bool,

    /// Late completions are ignored while closing
    pub is_closing: bool,

    /// Consecutive transport failures since the last successful open
    pub error_count: u32,

    /// Delay of the pending retry timer, if any
    pub pending_retry: Option<Duration>,

    /// Whether a recorder handle is held
    pub has_recorder: bool,

    pub channel: Option<ChannelStatus>,

    pub stats: SessionStats,
}

/// A single finalized transcript segment
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSegment {
    /// Transcribed text
    pub text: String,

    /// When this segment was received
    pub timestamp: DateTime<Utc>,

    /// Whether this is a partial (interim) result
    pub partial: bool,
}
