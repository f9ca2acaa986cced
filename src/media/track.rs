use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

/// Frames buffered per subscriber before the slowest one starts lagging
const TRACK_BUFFER_FRAMES: usize = 64;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the track started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Samples downmixed to mono and normalized to [-1.0, 1.0]
    pub fn mono_f32(&self) -> impl Iterator<Item = f32> + '_ {
        let channels = self.channels.max(1) as usize;
        self.samples.chunks(channels).map(|frame| {
            let sum: f32 = frame.iter().map(|s| *s as f32 / 32768.0).sum();
            sum / frame.len() as f32
        })
    }
}

/// Capture constraints requested for a microphone track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

impl From<&crate::config::CaptureConfig> for CaptureOptions {
    fn from(config: &crate::config::CaptureConfig) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
        }
    }
}

/// What a published track carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Microphone,
}

struct TrackInner {
    sid: String,
    frames: broadcast::Sender<AudioFrame>,
    ended: AtomicBool,
}

/// A live audio stream; clones share the same stream
#[derive(Clone)]
pub struct AudioTrack {
    inner: Arc<TrackInner>,
}

impl AudioTrack {
    pub fn new(sid: impl Into<String>) -> Self {
        let (frames, _) = broadcast::channel(TRACK_BUFFER_FRAMES);
        Self {
            inner: Arc::new(TrackInner {
                sid: sid.into(),
                frames,
                ended: AtomicBool::new(false),
            }),
        }
    }

    pub fn sid(&self) -> &str {
        &self.inner.sid
    }

    /// Receive frames pushed from now on; `None` once the track has ended
    pub fn subscribe(&self) -> Option<broadcast::Receiver<AudioFrame>> {
        if self.is_ended() {
            return None;
        }
        Some(self.inner.frames.subscribe())
    }

    /// Deliver a frame to every subscriber, returning how many received it
    pub fn push(&self, frame: AudioFrame) -> usize {
        if self.is_ended() {
            return 0;
        }
        self.inner.frames.send(frame).unwrap_or(0)
    }

    pub fn end(&self) {
        if !self.inner.ended.swap(true, Ordering::SeqCst) {
            debug!("Audio track {} ended", self.inner.sid);
        }
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTrack")
            .field("sid", &self.inner.sid)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// A microphone track owned by this client
pub struct LocalAudioTrack {
    track: AudioTrack,
    options: CaptureOptions,
    capture_task: Option<JoinHandle<()>>,
}

impl LocalAudioTrack {
    /// Wrap a track fed by `capture_task` (if any); the task is aborted on stop
    pub fn new(track: AudioTrack, options: CaptureOptions, capture_task: Option<JoinHandle<()>>) -> Self {
        Self {
            track,
            options,
            capture_task,
        }
    }

    pub fn sid(&self) -> &str {
        self.track.sid()
    }

    /// The raw captured stream
    pub fn media_track(&self) -> &AudioTrack {
        &self.track
    }

    pub fn options(&self) -> CaptureOptions {
        self.options
    }

    pub fn is_stopped(&self) -> bool {
        self.track.is_ended()
    }

    /// Stop capturing and end the track. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        self.track.end();
    }
}

impl Drop for LocalAudioTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_downmix_averages_channels() {
        let frame = AudioFrame {
            samples: vec![16384, 0, -16384, -16384],
            sample_rate: 48000,
            channels: 2,
            timestamp_ms: 0,
        };

        let mono: Vec<f32> = frame.mono_f32().collect();
        assert_eq!(mono, vec![0.25, -0.5]);
    }

    #[test]
    fn ended_track_rejects_subscribers_and_frames() {
        let track = AudioTrack::new("TR_mic");
        let mut rx = track.subscribe().unwrap();

        let frame = AudioFrame {
            samples: vec![1, 2, 3],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        };
        assert_eq!(track.push(frame.clone()), 1);
        assert_eq!(rx.try_recv().unwrap().samples, vec![1, 2, 3]);

        track.end();
        assert!(track.subscribe().is_none());
        assert_eq!(track.push(frame), 0);
    }

    #[test]
    fn stopping_local_track_twice_is_harmless() {
        let mut local = LocalAudioTrack::new(AudioTrack::new("TR_local"), CaptureOptions::default(), None);
        assert!(!local.is_stopped());

        local.stop();
        local.stop();
        assert!(local.is_stopped());
    }
}
