use std::fmt;
use std::sync::Arc;

/// One audio-process callback from a recorder.
///
/// Recorders may hand over their whole accumulated buffer list; only the
/// buffers from `new_buffer_index` onwards are new since the last callback.
#[derive(Debug, Clone)]
pub struct AudioProcess {
    /// Raw mono i16 PCM buffers
    pub buffers: Vec<Vec<i16>>,
    /// Normalised input level (0.0 to 1.0)
    pub power_level: f32,
    /// Duration of the newest buffer in milliseconds
    pub buffer_duration_ms: u64,
    /// Sample rate of the buffers in Hz
    pub sample_rate: u32,
    /// Index of the first buffer not yet delivered
    pub new_buffer_index: usize,
}

impl AudioProcess {
    /// Buffers produced since the previous callback
    pub fn new_buffers(&self) -> &[Vec<i16>] {
        self.buffers.get(self.new_buffer_index..).unwrap_or(&[])
    }
}

/// Notifications a recorder reports back to its owner
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// Device acquired; `start()` may be called
    Ready,
    /// Device acquisition failed
    Failed(String),
    /// Captured audio
    Audio(AudioProcess),
}

/// Callback sink handed to a recorder when it is opened.
///
/// Cheap to clone; recorders typically move a clone into their capture task.
#[derive(Clone)]
pub struct RecorderEvents {
    emit: Arc<dyn Fn(RecorderEvent) + Send + Sync>,
}

impl RecorderEvents {
    pub fn new(emit: impl Fn(RecorderEvent) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn ready(&self) {
        (self.emit)(RecorderEvent::Ready);
    }

    pub fn failed(&self, message: impl Into<String>) {
        (self.emit)(RecorderEvent::Failed(message.into()));
    }

    pub fn audio(&self, process: AudioProcess) {
        (self.emit)(RecorderEvent::Audio(process));
    }
}

impl fmt::Debug for RecorderEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderEvents").finish_non_exhaustive()
    }
}

/// Microphone capture capability
///
/// Implementations:
/// - File: replay a WAV file in real time (CLI, tests)
/// - Platform microphones live outside this crate and plug in here
///
/// None of the methods block. `open` must eventually report exactly one of
/// `Ready` or `Failed` through `events`; audio is only reported after `start`.
pub trait Recorder: Send {
    /// Begin acquiring the capture device
    fn open(&mut self, events: RecorderEvents);

    /// Start emitting audio (only valid after `Ready`)
    fn start(&mut self);

    /// Release the device; no events are reported afterwards
    fn close(&mut self);

    /// Recorder name for logging
    fn name(&self) -> &str;
}

/// Creates a fresh recorder for every device acquisition
pub trait RecorderFactory: Send + Sync {
    fn create(&self) -> Box<dyn Recorder>;
}
