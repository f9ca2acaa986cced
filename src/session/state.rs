use crate::backend::SessionCredentials;
use crate::media::{LocalAudioTrack, Participant, Room};
use crate::monitor::MonitorHandle;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Room connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Microphone publishing lifecycle; `Publishing` and `Unpublishing` only
/// exist while a toggle is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    #[default]
    Idle,
    Publishing,
    Recording,
    Unpublishing,
}

/// Every resource of the current session, owned in one place so teardown
/// can release each field independently
#[derive(Default)]
pub(crate) struct LiveSession {
    pub connection: ConnectionState,
    pub recording: RecordingState,

    /// Tags events from the current connection attempt; anything else is stale
    pub attempt: Option<Uuid>,
    pub credentials: Option<SessionCredentials>,
    pub room: Option<Arc<dyn Room>>,
    pub local_participant: Option<Participant>,
    pub event_task: Option<JoinHandle<()>>,

    pub local_track: Option<LocalAudioTrack>,
    pub user_monitor: Option<MonitorHandle>,
    pub ai_monitor: Option<MonitorHandle>,

    /// Sid of the remote agent participant, once identified
    pub agent_sid: Option<String>,
    /// Participant whose audio is behind `ai_monitor`
    pub ai_participant_sid: Option<String>,
}

impl LiveSession {
    pub fn is_current(&self, attempt: Uuid) -> bool {
        self.attempt == Some(attempt)
    }

    /// Stop both monitors and the local track. Each step only touches its own
    /// resource, so absent ones are skipped.
    pub fn release_media(&mut self) {
        if let Some(mut monitor) = self.user_monitor.take() {
            monitor.stop();
        }
        if let Some(mut monitor) = self.ai_monitor.take() {
            monitor.stop();
        }
        self.ai_participant_sid = None;
        if let Some(mut track) = self.local_track.take() {
            track.stop();
        }
    }
}
