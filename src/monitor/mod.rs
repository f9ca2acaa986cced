//! Audio level monitoring
//!
//! Turns a live audio track into a "speaking" boolean for one slot (the local
//! user or the remote agent) by sampling the spectrum of the most recent
//! audio on a fixed cadence.

mod analyser;
mod level;

pub use analyser::{is_speaking, FrequencyAnalyser};
pub use level::{AudioLevelMonitor, MonitorHandle, Slot, SpeakingSink};
