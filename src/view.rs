//! What a presentation layer renders for one session snapshot

use crate::session::SessionSnapshot;
use serde::Serialize;

pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_DISCONNECTED: &str = "Disconnected";
pub const LABEL_START: &str = "Start Recording";
pub const LABEL_STOP: &str = "Stop Recording";

/// Derived view of a [`SessionSnapshot`]. Observation only: rendering it
/// never changes session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub status: String,
    pub record_label: String,
    /// The record control only works while connected
    pub record_enabled: bool,
    pub ai_wave_active: bool,
    pub user_wave_active: bool,
    pub error: Option<String>,
    pub agent_present: bool,
    pub room_name: Option<String>,
}

impl From<&SessionSnapshot> for SessionView {
    fn from(snapshot: &SessionSnapshot) -> Self {
        let status = if snapshot.is_connected {
            STATUS_CONNECTED
        } else {
            STATUS_DISCONNECTED
        };
        let record_label = if snapshot.is_recording {
            LABEL_STOP
        } else {
            LABEL_START
        };

        Self {
            status: status.to_string(),
            record_label: record_label.to_string(),
            record_enabled: snapshot.is_connected,
            ai_wave_active: snapshot.ai_speaking,
            user_wave_active: snapshot.user_speaking && snapshot.is_recording,
            error: snapshot.error.clone(),
            agent_present: snapshot.agent_present,
            room_name: snapshot.room_name.clone(),
        }
    }
}
