use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use url::Url;

use super::messages::ControlFrame;

/// Close code of a normal, expected closure
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when a close frame carried no status
pub const NO_STATUS: u16 = 1005;
/// Close code reported when the connection dropped without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Identity of one physical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Lifecycle of the current channel as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// Waiting for the sign provider
    Signing,
    /// Socket handshake in progress
    Connecting,
    /// Frames may be sent
    Open,
}

/// Notifications a channel reports back to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Open,
    Message(String),
    Error(String),
    Closed { code: u16 },
}

/// Frames the session sends over a channel
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Control(ControlFrame),
    /// Binary 16 kHz PCM
    Audio(Vec<u8>),
}

/// Callback sink handed to a channel when it is created
#[derive(Clone)]
pub struct ChannelEvents {
    emit: Arc<dyn Fn(ChannelEvent) + Send + Sync>,
}

impl ChannelEvents {
    pub fn new(emit: impl Fn(ChannelEvent) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn open(&self) {
        (self.emit)(ChannelEvent::Open);
    }

    pub fn message(&self, payload: impl Into<String>) {
        (self.emit)(ChannelEvent::Message(payload.into()));
    }

    pub fn error(&self, error: impl Into<String>) {
        (self.emit)(ChannelEvent::Error(error.into()));
    }

    pub fn closed(&self, code: u16) {
        (self.emit)(ChannelEvent::Closed { code });
    }
}

impl fmt::Debug for ChannelEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEvents").finish_non_exhaustive()
    }
}

/// One connection to the recognition endpoint
///
/// Methods never block; delivery happens on the channel's own task.
pub trait Channel: Send {
    fn send(&mut self, frame: OutboundFrame);

    /// Close the connection (normal closure)
    fn close(&mut self);
}

/// Opens channels to the recognition endpoint
pub trait Connector: Send + Sync {
    /// Start connecting; progress is reported through `events`
    fn connect(&self, id: ChannelId, url: Url, events: ChannelEvents) -> Box<dyn Channel>;

    /// Connector name for logging
    fn name(&self) -> &str;
}
