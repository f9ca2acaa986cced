use thiserror::Error;

/// Which backend call produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOperation {
    CreateSession,
    EndSession,
}

/// Distinguishes an absent endpoint from any other non-success status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableKind {
    /// 404 on session creation: the backend does not implement the endpoint
    EndpointMissing,
    Status,
}

/// Failures of the voice session lifecycle.
///
/// The `Display` text of every variant is what ends up on the reactive
/// surface, so it is written for the person looking at the screen.
#[derive(Debug, Clone, Error)]
pub enum VoiceError {
    #[error(
        "Cannot connect to voice backend at {url} ({detail}). Please ensure:\n\
         1. the backend is running and listening at that address\n\
         2. cross-origin requests from this client are allowed by the backend\n\
         3. the backend URL is configured correctly (backend.browser_url / backend.server_url)"
    )]
    BackendUnreachable { url: String, detail: String },

    #[error("{}", describe_unavailable(.operation, .kind, .status, .body, .endpoint))]
    BackendUnavailable {
        operation: BackendOperation,
        kind: UnavailableKind,
        status: u16,
        body: String,
        endpoint: String,
    },

    #[error("Invalid response from voice backend: {0}")]
    InvalidResponse(String),

    #[error("Could not access the microphone: {0}")]
    MediaAcquisitionFailed(String),

    #[error("Failed to publish microphone track: {0}")]
    PublishFailed(String),

    #[error("Failed to unpublish microphone track: {0}")]
    UnpublishFailed(String),

    #[error("Failed to connect to voice room: {0}")]
    RemoteConnectFailed(String),

    #[error("Audio level monitoring unavailable: {0}")]
    MonitoringUnavailable(String),
}

impl VoiceError {
    pub fn is_endpoint_missing(&self) -> bool {
        matches!(
            self,
            VoiceError::BackendUnavailable {
                kind: UnavailableKind::EndpointMissing,
                ..
            }
        )
    }
}

fn describe_unavailable(
    operation: &BackendOperation,
    kind: &UnavailableKind,
    status: &u16,
    body: &str,
    endpoint: &str,
) -> String {
    match (operation, kind) {
        (_, UnavailableKind::EndpointMissing) => format!(
            "Voice session endpoint not found. Please ensure the backend has the \
             /api/voice/session endpoint implemented. Check {}",
            endpoint
        ),
        (BackendOperation::CreateSession, UnavailableKind::Status) => {
            format!("Failed to create voice session ({}): {}", status, body)
        }
        (BackendOperation::EndSession, UnavailableKind::Status) => {
            format!("Failed to end voice session: {} {}", status, body)
        }
    }
}
