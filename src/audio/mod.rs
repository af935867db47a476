pub mod file;
pub mod pcm;
pub mod recorder;

pub use file::{AudioFile, FileRecorderFactory};
pub use pcm::{encode_pcm, TARGET_SAMPLE_RATE};
pub use recorder::{AudioProcess, Recorder, RecorderEvent, RecorderEvents, RecorderFactory};
