//! Transport channel to the recognition endpoint
//!
//! A channel is one socket connection. The session owns at most one current
//! channel and replaces it on every restart; channels report their lifecycle
//! through `ChannelEvents` tagged with their `ChannelId`.

pub mod channel;
pub mod messages;
pub mod websocket;

pub use channel::{
    Channel, ChannelEvent, ChannelEvents, ChannelId, Connector, OutboundFrame, ReadyState,
    ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS,
};
pub use messages::{channel_url, ControlFrame, Lang, ServerMessage, StartData};
pub use websocket::WsConnector;
