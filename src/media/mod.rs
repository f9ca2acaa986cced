//! Media transport seam
//!
//! The real-time transport (signaling, codecs, network) belongs to an external
//! media SDK. This module names the contract the session manager drives:
//! - Live audio tracks and captured microphone tracks
//! - Capture devices that produce microphone tracks
//! - Rooms that connect, publish and emit lifecycle events
//!
//! Two in-process implementations ship with it: a loopback transport and a
//! WAV-file capture device.

pub mod capture;
pub mod events;
pub mod file;
pub mod loopback;
pub mod room;
pub mod track;

pub use capture::{AudioCapture, WavCapture};
pub use events::{EventBus, Subscription};
pub use file::AudioFile;
pub use loopback::{LoopbackConnector, LoopbackOptions, LoopbackRoom};
pub use room::{
    DisconnectReason, Participant, RemoteTrack, Room, RoomConnector, RoomEvent, RoomEventKind,
};
pub use track::{AudioFrame, AudioTrack, CaptureOptions, LocalAudioTrack, TrackSource};
