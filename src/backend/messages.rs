use serde::{Deserialize, Serialize};

/// Body of `POST /api/voice/session`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSessionRequest {
    pub user_id: String,
}

/// Credentials for joining one room, as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub room_name: String,
    /// Opaque bearer token for the media server
    pub token: String,
    /// Media server endpoint (e.g. `wss://...`)
    pub url: String,
}
