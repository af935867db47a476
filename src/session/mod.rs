//! Recognition session management
//!
//! This module provides the `SessionController` that coordinates:
//! - Recorder acquisition (kept across transport reconnects)
//! - Transport channel lifecycle (sign, connect, stream, close)
//! - Failure recovery with linear backoff
//! - Result/status/buffer callbacks to the caller

mod callbacks;
mod config;
mod session;
mod state;
mod stats;

pub use callbacks::{NoopCallbacks, SessionCallbacks, TranscriptCollector};
pub use config::SessionConfig;
pub use session::{retry_delay, SessionController, SessionHandle};
pub use state::SessionState;
pub use stats::{ChannelStatus, SessionSnapshot, SessionStats, TranscriptSegment};
