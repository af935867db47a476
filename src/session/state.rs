use serde::{Deserialize, Serialize};
use std::fmt;

/// Session state machine.
///
/// State transitions:
/// - Idle -> Starting (start)
/// - Starting -> Recording (channel opened)
/// - Starting | Recording -> Starting (start again, or server ended the utterance)
/// - Starting | Recording | Restarting -> Restarting(n) (transport failure n)
/// - Restarting(n) -> Starting (retry timer fired)
/// - any -> Stopping -> Idle (stop)
/// - any -> Idle (recorder acquisition failed)
///
/// `Idle` and `Stopping` are the closing states: late completions arriving
/// while closing must not restart anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SessionState {
    #[default]
    Idle,
    /// Acquiring the recorder and/or creating a channel
    Starting,
    /// Channel open, audio flowing
    Recording,
    /// Waiting for the backoff timer after `attempt` consecutive failures
    Restarting { attempt: u32 },
    Stopping,
}

impl SessionState {
    pub fn is_closing(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Stopping)
    }

    pub fn is_recording(&self) -> bool {
        !self.is_closing()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Recording => write!(f, "recording"),
            SessionState::Restarting { attempt } => write!(f, "restarting({})", attempt),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}
