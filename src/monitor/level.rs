use super::analyser::{is_speaking, FrequencyAnalyser};
use crate::config::MonitorConfig;
use crate::error::VoiceError;
use crate::media::{AudioFrame, AudioTrack};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Speaking-indicator channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// The local user's microphone
    User,
    /// The remote agent's audio
    Ai,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::User => write!(f, "user"),
            Slot::Ai => write!(f, "ai"),
        }
    }
}

/// Receives speaking decisions
pub trait SpeakingSink: Send + Sync {
    fn set_speaking(&self, slot: Slot, speaking: bool);
}

#[derive(Default)]
struct SlotCounters {
    active: AtomicUsize,
    started: AtomicUsize,
}

#[derive(Default)]
struct Counters {
    user: SlotCounters,
    ai: SlotCounters,
}

impl Counters {
    fn slot(&self, slot: Slot) -> &SlotCounters {
        match slot {
            Slot::User => &self.user,
            Slot::Ai => &self.ai,
        }
    }
}

/// Starts sampling loops that publish speaking decisions to a sink
#[derive(Clone)]
pub struct AudioLevelMonitor {
    config: MonitorConfig,
    sink: Arc<dyn SpeakingSink>,
    counters: Arc<Counters>,
}

impl AudioLevelMonitor {
    pub fn new(config: MonitorConfig, sink: Arc<dyn SpeakingSink>) -> Self {
        Self {
            config,
            sink,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Start monitoring `track` for `slot`.
    ///
    /// Fails with `MonitoringUnavailable` when there is no runtime to sample
    /// on, the analyser cannot be built, or the track has already ended.
    pub fn start(&self, track: &AudioTrack, slot: Slot) -> Result<MonitorHandle, VoiceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VoiceError::MonitoringUnavailable(e.to_string()))?;
        let analyser = FrequencyAnalyser::new(&self.config)?;
        let frames = track.subscribe().ok_or_else(|| {
            VoiceError::MonitoringUnavailable(format!("track {} has ended", track.sid()))
        })?;

        let live = Arc::new(Mutex::new(true));
        let publisher = Publisher {
            slot,
            sink: Arc::clone(&self.sink),
            live: Arc::clone(&live),
        };

        let task = runtime.spawn(sample_loop(
            track.clone(),
            frames,
            analyser,
            publisher,
            Duration::from_millis(self.config.interval_ms.max(1)),
            self.config.threshold,
        ));

        let counters = self.counters.slot(slot);
        counters.active.fetch_add(1, Ordering::SeqCst);
        counters.started.fetch_add(1, Ordering::SeqCst);

        info!("Monitoring {} audio on track {}", slot, track.sid());

        Ok(MonitorHandle {
            slot,
            track_sid: track.sid().to_string(),
            task: Some(task),
            live,
            sink: Arc::clone(&self.sink),
            counters: Arc::clone(&self.counters),
        })
    }

    /// Monitors currently running for `slot`
    pub fn active(&self, slot: Slot) -> usize {
        self.counters.slot(slot).active.load(Ordering::SeqCst)
    }

    /// Monitors ever started for `slot`
    pub fn started(&self, slot: Slot) -> usize {
        self.counters.slot(slot).started.load(Ordering::SeqCst)
    }
}

/// Cancellation capability for one running monitor.
///
/// Stopping resets the slot's indicator to false; dropping the handle stops it.
pub struct MonitorHandle {
    slot: Slot,
    track_sid: String,
    task: Option<JoinHandle<()>>,
    live: Arc<Mutex<bool>>,
    sink: Arc<dyn SpeakingSink>,
    counters: Arc<Counters>,
}

impl MonitorHandle {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn track_sid(&self) -> &str {
        &self.track_sid
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Cancel sampling and release the analyser. No-op once stopped.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        {
            // No decision from the loop may land after the reset below
            let mut live = self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            *live = false;
            self.sink.set_speaking(self.slot, false);
        }
        task.abort();

        self.counters
            .slot(self.slot)
            .active
            .fetch_sub(1, Ordering::SeqCst);

        debug!("Stopped {} monitor on track {}", self.slot, self.track_sid);
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Publisher {
    slot: Slot,
    sink: Arc<dyn SpeakingSink>,
    live: Arc<Mutex<bool>>,
}

impl Publisher {
    fn publish(&self, speaking: bool) {
        let live = self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *live {
            self.sink.set_speaking(self.slot, speaking);
        }
    }
}

async fn sample_loop(
    track: AudioTrack,
    mut frames: broadcast::Receiver<AudioFrame>,
    mut analyser: FrequencyAnalyser,
    publisher: Publisher,
    period: Duration,
    threshold: u8,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut received = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if track.is_ended() {
                    break;
                }
                // A track that delivered nothing since the last tick is silent
                if !received {
                    analyser.clear_samples();
                }
                received = false;

                let level = analyser.mean_level();
                publisher.publish(is_speaking(level, threshold));
            }
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    analyser.push_frame(&frame);
                    received = true;
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("{} monitor lagged by {} frames", publisher.slot, skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    publisher.publish(false);
    debug!("{} monitor on track {} finished", publisher.slot, track.sid());
}
