use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use super::channel::{
    Channel, ChannelEvents, ChannelId, Connector, OutboundFrame, ABNORMAL_CLOSURE, NO_STATUS,
};

/// How long to wait for the server's close frame after closing
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default limit for the TCP/TLS/WebSocket handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket connector for the recognition endpoint
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Give up on handshakes that take longer than `timeout`
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: timeout,
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WsConnector {
    fn connect(&self, id: ChannelId, url: Url, events: ChannelEvents) -> Box<dyn Channel> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(id, url, self.connect_timeout, events, rx));
        Box::new(WsChannel { tx })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

enum Command {
    Send(OutboundFrame),
    Close,
}

struct WsChannel {
    tx: mpsc::UnboundedSender<Command>,
}

impl Channel for WsChannel {
    fn send(&mut self, frame: OutboundFrame) {
        // The socket task is gone once the connection ended
        let _ = self.tx.send(Command::Send(frame));
    }

    fn close(&mut self) {
        let _ = self.tx.send(Command::Close);
    }
}

fn to_message(frame: OutboundFrame) -> serde_json::Result<Message> {
    Ok(match frame {
        OutboundFrame::Control(control) => Message::Text(serde_json::to_string(&control)?.into()),
        OutboundFrame::Audio(pcm) => Message::Binary(pcm.into()),
    })
}

fn close_code(frame: Option<CloseFrame>) -> u16 {
    frame.map(|f| u16::from(f.code)).unwrap_or(NO_STATUS)
}

async fn run_socket(
    id: ChannelId,
    url: Url,
    connect_timeout: Duration,
    events: ChannelEvents,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    info!(
        "Connecting channel {} to {}",
        id,
        url.host_str().unwrap_or("<no host>")
    );

    let ws_stream = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => {
            warn!("Channel {} failed to connect: {}", id, e);
            events.error(e.to_string());
            events.closed(ABNORMAL_CLOSURE);
            return;
        }
        Err(_) => {
            warn!("Channel {} connect timed out after {:?}", id, connect_timeout);
            events.error(format!("connect timed out after {:?}", connect_timeout));
            events.closed(ABNORMAL_CLOSURE);
            return;
        }
    };

    info!("Channel {} connected", id);
    events.open();

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(frame)) => {
                    let message = match to_message(frame) {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("Channel {} failed to encode frame: {}", id, e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(message).await {
                        warn!("Channel {} send failed: {}", id, e);
                        events.error(e.to_string());
                        events.closed(ABNORMAL_CLOSURE);
                        return;
                    }
                }
                // Close requested, or the owner dropped the channel
                Some(Command::Close) | None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => events.message(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    let code = close_code(frame);
                    debug!("Channel {} closed by server ({})", id, code);
                    events.closed(code);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Channel {} receive failed: {}", id, e);
                    events.error(e.to_string());
                    events.closed(ABNORMAL_CLOSURE);
                    return;
                }
                None => {
                    events.closed(ABNORMAL_CLOSURE);
                    return;
                }
            },
        }
    }

    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: Default::default(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!("Channel {} close frame not sent: {}", id, e);
        events.closed(ABNORMAL_CLOSURE);
        return;
    }

    let drained = tokio::time::timeout(CLOSE_TIMEOUT, async {
        while let Some(incoming) = stream.next().await {
            match incoming {
                Ok(Message::Close(frame)) => return close_code(frame),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        ABNORMAL_CLOSURE
    })
    .await;

    let code = drained.unwrap_or(ABNORMAL_CLOSURE);
    debug!("Channel {} closed ({})", id, code);
    events.closed(code);
}
