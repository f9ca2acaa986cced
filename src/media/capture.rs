use super::file::AudioFile;
use super::track::{AudioFrame, AudioTrack, CaptureOptions, LocalAudioTrack};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

/// Microphone capture device
///
/// Implementations:
/// - `WavCapture`: plays a WAV file as the microphone (demos, tests)
/// - Browser/OS capture lives with the media SDK that owns the device
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire a live microphone track with the given constraints
    async fn create_local_audio_track(&self, options: &CaptureOptions) -> Result<LocalAudioTrack>;
}

/// Capture device backed by a WAV file, looped in real time
pub struct WavCapture {
    path: Option<PathBuf>,
    frame_duration: Duration,
}

impl WavCapture {
    pub fn new(path: Option<PathBuf>, frame_duration: Duration) -> Self {
        Self {
            path,
            frame_duration: frame_duration.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &crate::config::CaptureConfig) -> Self {
        Self::new(
            config.wav_path.as_ref().map(PathBuf::from),
            Duration::from_millis(config.frame_ms),
        )
    }
}

#[async_trait::async_trait]
impl AudioCapture for WavCapture {
    async fn create_local_audio_track(&self, options: &CaptureOptions) -> Result<LocalAudioTrack> {
        let Some(path) = self.path.clone() else {
            anyhow::bail!("No capture device configured (set capture.wav_path)");
        };

        let file = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .context("Capture loader task failed")??;

        if file.samples.is_empty() || file.sample_rate == 0 || file.channels == 0 {
            anyhow::bail!("Capture file {} contains no audio", file.path);
        }

        let track = AudioTrack::new(format!("TR_mic_{}", Uuid::new_v4().simple()));

        // Constraints are passed through; a file has nothing to cancel or normalize
        info!(
            "Capturing from {} (echo_cancellation={}, noise_suppression={}, auto_gain_control={})",
            file.path, options.echo_cancellation, options.noise_suppression, options.auto_gain_control
        );

        let task = tokio::spawn(play_looped(track.clone(), file, self.frame_duration));

        Ok(LocalAudioTrack::new(track, *options, Some(task)))
    }
}

/// Push `file` into `track` one frame per tick until the track ends
async fn play_looped(track: AudioTrack, file: AudioFile, frame_duration: Duration) {
    let channels = file.channels as usize;
    let frames_per_tick =
        ((file.sample_rate as u128 * frame_duration.as_millis()) / 1000).max(1) as usize;
    let samples_per_tick = frames_per_tick * channels;

    let mut ticker = interval(frame_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut position = 0usize;
    let mut timestamp_ms = 0u64;

    loop {
        ticker.tick().await;
        if track.is_ended() {
            break;
        }

        let mut samples = Vec::with_capacity(samples_per_tick);
        while samples.len() < samples_per_tick {
            let take = (samples_per_tick - samples.len()).min(file.samples.len() - position);
            samples.extend_from_slice(&file.samples[position..position + take]);
            position = (position + take) % file.samples.len();
        }

        track.push(AudioFrame {
            samples,
            sample_rate: file.sample_rate,
            channels: file.channels,
            timestamp_ms,
        });
        timestamp_ms += frame_duration.as_millis() as u64;
    }

    debug!("Capture of {} stopped", file.path);
}
