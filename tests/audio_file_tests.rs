// Integration tests for audio file processing
//
// These tests verify that we can read WAV files and replay them through the
// recorder interface. Fixtures are generated into a temp dir with hound.

use anyhow::Result;
use loqa_asr::audio::{AudioFile, FileRecorderFactory, RecorderEvent, RecorderEvents, RecorderFactory};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn write_wav(dir: &TempDir, name: &str, sample_rate: u32, channels: u16, frames: usize) -> PathBuf {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for frame in 0..frames {
        for channel in 0..channels {
            // Left and right differ so mono mixing is observable
            let sample = (frame as i16 % 100) * if channel == 0 { 10 } else { 30 };
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
    path
}

fn recorder_sink() -> (RecorderEvents, mpsc::UnboundedReceiver<RecorderEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let events = RecorderEvents::new(move |event| {
        let _ = tx.send(event);
    });
    (events, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<RecorderEvent>) -> RecorderEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for recorder event")
        .expect("Recorder event sink closed")
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_wav(&dir, "speech.wav", 16000, 1, 8000);

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 8000);
    assert!((audio.duration_seconds - 0.5).abs() < 1e-9);

    // Verify path is stored
    assert!(audio.path.contains("speech.wav"));

    Ok(())
}

#[test]
fn test_audio_file_stereo_duration_and_mono_mix() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_wav(&dir, "stereo.wav", 48000, 2, 4800);

    let audio = AudioFile::open(&path)?;
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.samples.len(), 9600);
    assert!((audio.duration_seconds - 0.1).abs() < 1e-9);

    let mono = audio.to_mono();
    assert_eq!(mono.len(), 4800);
    // Frame 3: left 30, right 90
    assert_eq!(mono[3], 60);

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_audio_file_not_a_wav() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("notes.wav");
    std::fs::write(&path, b"definitely not RIFF")?;

    assert!(AudioFile::open(&path).is_err());
    Ok(())
}

#[tokio::test]
async fn test_file_recorder_replays_in_buffers() {
    let dir = tempfile::tempdir().unwrap();
    // 0.3s at 16 kHz -> three 100ms buffers
    let path = write_wav(&dir, "speech.wav", 16000, 1, 4800);

    let factory = FileRecorderFactory::new(&path, 100);
    let finished = factory.finished();
    let mut recorder = factory.create();
    let (events, mut rx) = recorder_sink();

    recorder.open(events);
    assert!(matches!(next_event(&mut rx).await, RecorderEvent::Ready));

    recorder.start();

    let mut total = 0;
    for _ in 0..3 {
        match next_event(&mut rx).await {
            RecorderEvent::Audio(process) => {
                assert_eq!(process.sample_rate, 16000);
                assert_eq!(process.new_buffers().len(), 1);
                assert_eq!(process.new_buffers()[0].len(), 1600);
                assert_eq!(process.buffer_duration_ms, 100);
                assert!((0.0..=1.0).contains(&process.power_level));
                total += process.new_buffers()[0].len();
            }
            other => panic!("Expected audio, got {:?}", other),
        }
    }
    assert_eq!(total, 4800);

    tokio::time::timeout(Duration::from_secs(5), finished.notified())
        .await
        .expect("Replay should finish");
    recorder.close();
}

#[tokio::test]
async fn test_file_recorder_waits_for_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir, "speech.wav", 16000, 1, 1600);

    let factory = FileRecorderFactory::new(&path, 100);
    let mut recorder = factory.create();
    let (events, mut rx) = recorder_sink();

    recorder.open(events);
    assert!(matches!(next_event(&mut rx).await, RecorderEvent::Ready));

    let early = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(early.is_err(), "No audio before start()");

    recorder.close();
}

#[tokio::test]
async fn test_file_recorder_missing_file_fails() {
    let factory = FileRecorderFactory::new(Path::new("/nonexistent/audio.wav"), 100);
    let mut recorder = factory.create();
    let (events, mut rx) = recorder_sink();

    recorder.open(events);

    match next_event(&mut rx).await {
        RecorderEvent::Failed(message) => assert!(message.contains("audio.wav")),
        other => panic!("Expected failure, got {:?}", other),
    }
}
