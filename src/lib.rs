pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod sign;
pub mod transcribe;
pub mod transport;

pub use audio::{
    AudioFile, AudioProcess, FileRecorderFactory, Recorder, RecorderEvent, RecorderEvents,
    RecorderFactory,
};
pub use config::Config;
pub use error::{SessionError, SignError};
pub use http::{create_router, AppState};
pub use session::{
    SessionCallbacks, SessionConfig, SessionController, SessionHandle, SessionSnapshot,
    SessionState, SessionStats, TranscriptCollector, TranscriptSegment,
};
pub use sign::{LocalSigner, RemoteSigner, SignProvider};
pub use transcribe::{transcribe_file, StopSignal};
pub use transport::{Channel, ChannelEvent, ChannelEvents, ChannelId, Connector, Lang, WsConnector};
