use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::pcm::power_level;
use super::recorder::{AudioProcess, Recorder, RecorderEvents, RecorderFactory};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.channels == 0 {
            anyhow::bail!("WAV file declares zero channels: {}", path.display());
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Interleaved samples averaged down to one channel
    pub fn to_mono(&self) -> Vec<i16> {
        if self.channels == 1 {
            return self.samples.clone();
        }

        let channels = self.channels as usize;
        self.samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    }
}

/// Recorder factory that replays a WAV file as if it were a live microphone
///
/// Every recorder created by the factory replays the file from the start.
pub struct FileRecorderFactory {
    path: PathBuf,
    buffer_duration_ms: u64,
    finished: Arc<Notify>,
}

impl FileRecorderFactory {
    pub fn new(path: impl Into<PathBuf>, buffer_duration_ms: u64) -> Self {
        Self {
            path: path.into(),
            buffer_duration_ms: buffer_duration_ms.max(1),
            finished: Arc::new(Notify::new()),
        }
    }

    /// Notified once a recorder has emitted the whole file
    pub fn finished(&self) -> Arc<Notify> {
        Arc::clone(&self.finished)
    }
}

impl RecorderFactory for FileRecorderFactory {
    fn create(&self) -> Box<dyn Recorder> {
        Box::new(FileRecorder {
            path: self.path.clone(),
            buffer_duration_ms: self.buffer_duration_ms,
            finished: Arc::clone(&self.finished),
            start_signal: Arc::new(Notify::new()),
            task: None,
        })
    }
}

struct FileRecorder {
    path: PathBuf,
    buffer_duration_ms: u64,
    finished: Arc<Notify>,
    start_signal: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl Recorder for FileRecorder {
    fn open(&mut self, events: RecorderEvents) {
        let path = self.path.clone();
        let buffer_duration_ms = self.buffer_duration_ms;
        let start_signal = Arc::clone(&self.start_signal);
        let finished = Arc::clone(&self.finished);

        self.task = Some(tokio::spawn(async move {
            let audio = match tokio::task::spawn_blocking(move || AudioFile::open(path)).await {
                Ok(Ok(audio)) => audio,
                Ok(Err(e)) => {
                    events.failed(format!("{:#}", e));
                    return;
                }
                Err(e) => {
                    events.failed(format!("Audio file loader panicked: {}", e));
                    return;
                }
            };

            events.ready();
            start_signal.notified().await;

            let samples = audio.to_mono();
            let sample_rate = audio.sample_rate.max(1);
            let chunk_len = (sample_rate as u64 * buffer_duration_ms / 1000).max(1) as usize;
            let mut ticker = tokio::time::interval(Duration::from_millis(buffer_duration_ms));

            for chunk in samples.chunks(chunk_len) {
                ticker.tick().await;
                events.audio(AudioProcess {
                    buffers: vec![chunk.to_vec()],
                    power_level: power_level(chunk),
                    buffer_duration_ms: chunk.len() as u64 * 1000 / sample_rate as u64,
                    sample_rate,
                    new_buffer_index: 0,
                });
            }

            info!("Audio file replay finished: {}", audio.path);
            finished.notify_one();
        }));
    }

    fn start(&mut self) {
        if self.task.is_none() {
            warn!("File recorder started before open");
            return;
        }
        self.start_signal.notify_one();
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileRecorder {
    fn drop(&mut self) {
        self.close();
    }
}
