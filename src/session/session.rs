use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use super::callbacks::SessionCallbacks;
use super::config::SessionConfig;
use super::state::SessionState;
use super::stats::{ChannelStatus, SessionSnapshot, SessionStats};
use crate::audio::{encode_pcm, AudioProcess, Recorder, RecorderEvent, RecorderEvents, RecorderFactory};
use crate::error::{SessionError, SignError};
use crate::sign::{signer_for, SignProvider};
use crate::transport::{
    channel_url, Channel, ChannelEvent, ChannelEvents, ChannelId, Connector, ControlFrame,
    OutboundFrame, ReadyState, ServerMessage, WsConnector, NORMAL_CLOSURE,
};

/// Delay before the retry following `error_count` consecutive failures
pub fn retry_delay(step: Duration, error_count: u32) -> Duration {
    step.saturating_mul(error_count)
}

/// Everything the session reacts to, processed strictly in order
enum SessionEvent {
    Start,
    Stop,
    Shutdown,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Recorder {
        generation: u64,
        event: RecorderEvent,
    },
    Signed {
        channel: ChannelId,
        time: i64,
        result: Result<String, SignError>,
    },
    Channel {
        channel: ChannelId,
        event: ChannelEvent,
    },
    RetryFired {
        timer: u64,
    },
}

struct RecorderSlot {
    generation: u64,
    recorder: Box<dyn Recorder>,
    ready: bool,
}

struct ChannelSlot {
    id: ChannelId,
    ready_state: ReadyState,
    /// Set once the signature arrived and the connector was asked to connect
    channel: Option<Box<dyn Channel>>,
    sign_task: Option<JoinHandle<()>>,
    sid: Option<String>,
}

struct RetryTimer {
    id: u64,
    delay: Duration,
    task: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// Replace the transport, keep the recorder running
    KeepRecorder,
    /// Release everything
    Release,
}

/// Coordinates the recorder, the transport channel and the retry policy
///
/// The controller runs on its own task and owns all session state; recorder,
/// channel, sign and timer completions come back as events tagged with the
/// generation/id they belong to, so completions from superseded resources
/// are recognised and ignored.
pub struct SessionController {
    /// Session configuration
    config: SessionConfig,

    /// Validated socket endpoint, without per-channel query parameters
    socket_url: Url,

    /// Creates a recorder for every device acquisition
    recorders: Arc<dyn RecorderFactory>,

    /// Opens transport channels
    connector: Arc<dyn Connector>,

    /// Signs every channel URL
    signer: Arc<dyn SignProvider>,

    /// Caller notifications
    callbacks: Arc<dyn SessionCallbacks>,

    /// Cloned into every recorder, channel, sign and timer task
    events_tx: mpsc::UnboundedSender<SessionEvent>,

    /// Consumed by the event loop
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,

    /// Current lifecycle state
    state: SessionState,

    /// Held recorder, kept across channel restarts
    recorder: Option<RecorderSlot>,

    /// The single current channel
    channel: Option<ChannelSlot>,

    /// The single pending backoff timer
    retry: Option<RetryTimer>,

    /// Consecutive transport failures since the last successful open
    error_count: u32,

    /// Last recorder generation handed out
    next_recorder: u64,

    /// Last channel id handed out
    next_channel: u64,

    /// Last retry timer id handed out
    next_timer: u64,

    /// Cumulative counters
    stats: SessionStats,
}

impl SessionController {
    /// Create a controller with explicit collaborators
    pub fn new(
        config: SessionConfig,
        recorders: Arc<dyn RecorderFactory>,
        connector: Arc<dyn Connector>,
        signer: Arc<dyn SignProvider>,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Self, SessionError> {
        let socket_url = config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!("Creating ASR session: {}", config.session_id);

        Ok(Self {
            config,
            socket_url,
            recorders,
            connector,
            signer,
            callbacks,
            events_tx,
            events_rx,
            state: SessionState::Idle,
            recorder: None,
            channel: None,
            retry: None,
            error_count: 0,
            next_recorder: 0,
            next_channel: 0,
            next_timer: 0,
            stats: SessionStats::default(),
        })
    }

    /// Create a controller using the WebSocket transport and the configured signer
    pub fn with_defaults(
        config: SessionConfig,
        recorders: Arc<dyn RecorderFactory>,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Self, SessionError> {
        let signer = signer_for(&config)?;
        Self::new(config, recorders, Arc::new(WsConnector::new()), signer, callbacks)
    }

    /// Run the controller on a new task
    pub fn spawn(self) -> SessionHandle {
        let tx = self.events_tx.clone();
        let task = tokio::spawn(self.run());
        SessionHandle {
            tx,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        info!("Session {} event loop started", self.config.session_id);

        while let Some(event) = self.events_rx.recv().await {
            if !self.handle(event) {
                break;
            }
        }

        info!("Session {} event loop stopped", self.config.session_id);
    }

    /// Returns false once the loop should end
    fn handle(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Start => self.start_recording(),
            SessionEvent::Stop => self.stop_recording(),
            SessionEvent::Shutdown => {
                if self.state.is_recording() {
                    self.stop_recording();
                } else {
                    self.teardown(Teardown::Release);
                }
                return false;
            }
            SessionEvent::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionEvent::Recorder { generation, event } => self.on_recorder_event(generation, event),
            SessionEvent::Signed {
                channel,
                time,
                result,
            } => self.on_signed(channel, time, result),
            SessionEvent::Channel { channel, event } => self.on_channel_event(channel, event),
            SessionEvent::RetryFired { timer } => self.on_retry_fired(timer),
        }
        true
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(
                "Session {}: {} -> {}",
                self.config.session_id, self.state, next
            );
            self.state = next;
        }
    }

    // ------------------------------------------------------------------
    // start / stop
    // ------------------------------------------------------------------

    fn start_recording(&mut self) {
        info!("Starting ASR session: {}", self.config.session_id);

        self.callbacks.on_status_change(true);
        if self.stats.started_at.is_none() {
            self.stats.started_at = Some(Utc::now());
        }

        self.restart();
    }

    fn stop_recording(&mut self) {
        info!("Stopping ASR session: {}", self.config.session_id);

        self.transition(SessionState::Stopping);
        self.teardown(Teardown::Release);
        self.transition(SessionState::Idle);

        self.callbacks.on_status_change(false);
    }

    /// Replace the transport, reusing the recorder when one is held
    fn restart(&mut self) {
        self.teardown(Teardown::KeepRecorder);
        self.transition(SessionState::Starting);

        match self.recorder.as_ref().map(|slot| (slot.generation, slot.ready)) {
            Some((_, true)) => self.create_channel(),
            // The pending ready event creates the channel
            Some((generation, false)) => debug!("Recorder {} still opening", generation),
            None => self.acquire_recorder(),
        }
    }

    fn teardown(&mut self, mode: Teardown) {
        self.cancel_retry();

        if mode == Teardown::Release {
            if let Some(mut slot) = self.recorder.take() {
                info!("Releasing recorder {}", slot.generation);
                slot.recorder.close();
            }
        }

        if let Some(mut slot) = self.channel.take() {
            if let Some(task) = slot.sign_task.take() {
                task.abort();
            }
            if let Some(channel) = slot.channel.as_mut() {
                if slot.ready_state == ReadyState::Open {
                    channel.send(OutboundFrame::Control(ControlFrame::End));
                }
                channel.close();
            }
            debug!("Closed channel {}", slot.id);
        }
    }

    // ------------------------------------------------------------------
    // recorder
    // ------------------------------------------------------------------

    fn acquire_recorder(&mut self) {
        self.next_recorder += 1;
        let generation = self.next_recorder;

        let mut recorder = self.recorders.create();
        info!("Opening recorder {} ({})", generation, recorder.name());

        let tx = self.events_tx.clone();
        recorder.open(RecorderEvents::new(move |event| {
            let _ = tx.send(SessionEvent::Recorder { generation, event });
        }));

        self.recorder = Some(RecorderSlot {
            generation,
            recorder,
            ready: false,
        });
    }

    fn on_recorder_event(&mut self, generation: u64, event: RecorderEvent) {
        let current = self.recorder.as_ref().map(|slot| slot.generation);
        if current != Some(generation) {
            debug!("Ignoring event from released recorder {}", generation);
            return;
        }

        match event {
            RecorderEvent::Ready => {
                if let Some(slot) = self.recorder.as_mut() {
                    info!("Recorder {} ready", generation);
                    slot.ready = true;
                    slot.recorder.start();
                }
                self.create_channel();
            }
            RecorderEvent::Failed(message) => {
                error!("Recorder {} failed to start: {}", generation, message);
                self.callbacks.on_error(&SessionError::Recorder(message));
                self.teardown(Teardown::Release);
                self.transition(SessionState::Idle);
                self.callbacks.on_status_change(false);
            }
            RecorderEvent::Audio(process) => self.forward_audio(process),
        }
    }

    fn forward_audio(&mut self, process: AudioProcess) {
        let buffers = process.new_buffers();
        if buffers.is_empty() {
            return;
        }

        self.callbacks.on_buffer(buffers);

        // Audio produced before the channel is open is dropped, not queued
        match self.channel.as_mut() {
            Some(slot) if slot.ready_state == ReadyState::Open => {
                if let Some(channel) = slot.channel.as_mut() {
                    let pcm = encode_pcm(buffers, process.sample_rate);
                    self.stats.frames_sent += 1;
                    self.stats.bytes_sent += pcm.len();
                    channel.send(OutboundFrame::Audio(pcm));
                }
            }
            _ => self.stats.frames_dropped += 1,
        }
    }

    // ------------------------------------------------------------------
    // channel
    // ------------------------------------------------------------------

    fn create_channel(&mut self) {
        self.next_channel += 1;
        let id = ChannelId(self.next_channel);
        let time = Utc::now().timestamp_millis();

        debug!("Signing channel {} with {} signer", id, self.signer.name());

        let signer = Arc::clone(&self.signer);
        let app_key = self.config.app_key.clone();
        let tx = self.events_tx.clone();
        let sign_task = tokio::spawn(async move {
            let result = signer.sign(&app_key, time).await;
            let _ = tx.send(SessionEvent::Signed {
                channel: id,
                time,
                result,
            });
        });

        self.channel = Some(ChannelSlot {
            id,
            ready_state: ReadyState::Signing,
            channel: None,
            sign_task: Some(sign_task),
            sid: None,
        });
        self.stats.channels_created += 1;
    }

    fn on_signed(&mut self, id: ChannelId, time: i64, result: Result<String, SignError>) {
        let Some(slot) = self
            .channel
            .as_mut()
            .filter(|slot| slot.id == id && slot.ready_state == ReadyState::Signing)
        else {
            debug!("Dropping signature for stale channel {}", id);
            return;
        };
        slot.sign_task = None;

        let sign = match result {
            Ok(sign) => sign,
            Err(e) => {
                // Configuration/auth problem, not transient: surface it, no retry
                error!("Failed to sign channel {}: {}", id, e);
                self.channel = None;
                self.callbacks.on_error(&SessionError::Sign(e));
                return;
            }
        };

        let url = channel_url(&self.socket_url, &self.config.app_key, time, &sign);
        let tx = self.events_tx.clone();
        let events = ChannelEvents::new(move |event| {
            let _ = tx.send(SessionEvent::Channel { channel: id, event });
        });

        info!("Opening channel {} via {}", id, self.connector.name());
        slot.channel = Some(self.connector.connect(id, url, events));
        slot.ready_state = ReadyState::Connecting;
    }

    fn on_channel_event(&mut self, id: ChannelId, event: ChannelEvent) {
        let current = self.channel.as_ref().map(|slot| slot.id);
        if current != Some(id) {
            debug!("Ignoring {:?} from stale channel {}", event, id);
            return;
        }

        match event {
            ChannelEvent::Open => self.on_channel_open(id),
            ChannelEvent::Message(payload) => self.on_channel_message(id, &payload),
            ChannelEvent::Error(e) => {
                // Clearing the slot makes any later terminal event from this socket stale
                let sid = self.channel.take().and_then(|slot| slot.sid);
                warn!("Channel {} error (sid {:?}): {}", id, sid, e);
                if self.state.is_closing() {
                    return;
                }
                self.schedule_retry();
            }
            ChannelEvent::Closed { code } => {
                let sid = self.channel.take().and_then(|slot| slot.sid);
                if code == NORMAL_CLOSURE {
                    info!("Channel {} closed normally (sid {:?})", id, sid);
                    return;
                }
                warn!("Channel {} closed with code {} (sid {:?})", id, code, sid);
                if self.state.is_closing() {
                    return;
                }
                self.schedule_retry();
            }
        }
    }

    fn on_channel_open(&mut self, id: ChannelId) {
        let Some(slot) = self.channel.as_mut() else {
            return;
        };
        if slot.ready_state != ReadyState::Connecting {
            debug!("Channel {} reported open while {:?}", id, slot.ready_state);
            return;
        }

        info!("Channel {} open", id);
        slot.ready_state = ReadyState::Open;
        if let Some(channel) = slot.channel.as_mut() {
            channel.send(OutboundFrame::Control(ControlFrame::start(
                self.config.lang,
                &self.config.app_key,
                &self.config.user_id,
                &self.config.udid,
            )));
        }

        // A successful open proves the transport is healthy again
        self.error_count = 0;
        self.stats.channels_opened += 1;
        self.transition(SessionState::Recording);
    }

    fn on_channel_message(&mut self, id: ChannelId, payload: &str) {
        match ServerMessage::parse(payload) {
            Ok(ServerMessage::Transcript { text, partial, sid }) => {
                if let (Some(slot), Some(sid)) = (self.channel.as_mut(), sid.as_ref()) {
                    slot.sid = Some(sid.clone());
                }
                if sid.is_some() {
                    self.stats.last_sid = sid;
                }
                self.stats.transcript_segments_count += 1;
                self.callbacks.on_result_change(&text, partial);
            }
            Ok(ServerMessage::UtteranceEnd) => {
                info!("Utterance ended on channel {}: {}", id, payload);
                if self.state.is_closing() {
                    return;
                }
                self.restart();
            }
            Err(e) => warn!("Ignoring malformed frame on channel {}: {}", id, e),
        }
    }

    // ------------------------------------------------------------------
    // retry
    // ------------------------------------------------------------------

    fn schedule_retry(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
        self.cancel_retry();

        let delay = retry_delay(self.config.retry_step(), self.error_count);
        self.next_timer += 1;
        let id = self.next_timer;

        let deadline = tokio::time::Instant::now() + delay;
        let tx = self.events_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(SessionEvent::RetryFired { timer: id });
        });

        info!(
            "Reconnecting in {}ms (attempt {})",
            delay.as_millis(),
            self.error_count
        );

        self.retry = Some(RetryTimer { id, delay, task });
        self.stats.retries_scheduled += 1;
        self.transition(SessionState::Restarting {
            attempt: self.error_count,
        });
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry.take() {
            debug!("Cancelled retry timer {}", timer.id);
            timer.task.abort();
        }
    }

    fn on_retry_fired(&mut self, timer: u64) {
        if self.retry.as_ref().map(|t| t.id) != Some(timer) {
            debug!("Ignoring cancelled retry timer {}", timer);
            return;
        }
        self.retry = None;

        if self.state.is_closing() {
            return;
        }
        self.restart();
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            is_recording: self.state.is_recording(),
            is_closing: self.state.is_closing(),
            error_count: self.error_count,
            pending_retry: self.retry.as_ref().map(|t| t.delay),
            has_recorder: self.recorder.is_some(),
            channel: self.channel.as_ref().map(|slot| ChannelStatus {
                id: slot.id,
                ready_state: slot.ready_state,
                sid: slot.sid.clone(),
            }),
            stats: self.stats.clone(),
        }
    }
}

/// Caller-side controls for a running session
///
/// `start` and `stop` return immediately; their effects are observed through
/// `SessionCallbacks`. Dropping the handle shuts the session down.
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Start (or restart) recognition
    pub fn start(&self) {
        self.send(SessionEvent::Start);
    }

    /// Stop recognition and release the recorder
    pub fn stop(&self) {
        self.send(SessionEvent::Stop);
    }

    /// Session state after every previously queued event has been handled
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionEvent::Snapshot(reply_tx))
            .map_err(|_| anyhow::anyhow!("Session event loop has stopped"))?;

        reply_rx.await.context("Session event loop has stopped")
    }

    /// Stop if running and end the event loop
    pub async fn shutdown(mut self) -> Result<()> {
        self.send(SessionEvent::Shutdown);
        if let Some(task) = self.task.take() {
            task.await.context("Session task panicked")?;
        }
        Ok(())
    }

    fn send(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            warn!("Session event loop has stopped");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.tx.send(SessionEvent::Shutdown);
        }
    }
}
