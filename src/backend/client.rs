use super::messages::{SessionCredentials, VoiceSessionRequest};
use crate::config::{BackendConfig, ExecutionContext};
use crate::error::{BackendOperation, UnavailableKind, VoiceError};
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

/// Backend calls the session manager depends on
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    /// Request a room and a token; a `user-<millis>` id is generated when none is given
    async fn create_session(&self, user_id: Option<&str>) -> Result<SessionCredentials, VoiceError>;

    /// Tear the room down; a room the backend no longer knows counts as ended
    async fn end_session(&self, room_name: &str) -> Result<(), VoiceError>;
}

/// HTTP client for the session backend
pub struct SessionClient {
    http: Client,
    base_url: Url,
}

impl SessionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid backend URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Backend URL cannot carry a path: {}", base_url);
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &BackendConfig, context: ExecutionContext) -> Result<Self> {
        let base_url = config.base_url(context);
        info!("Voice backend at {} ({:?} context)", base_url, context);
        Self::new(&base_url, Duration::from_secs(config.request_timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // checked in new(): the base URL always has a hierarchical path
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn unreachable(&self, err: reqwest::Error) -> VoiceError {
        VoiceError::BackendUnreachable {
            url: self.base_url().to_string(),
            detail: err.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SessionApi for SessionClient {
    async fn create_session(&self, user_id: Option<&str>) -> Result<SessionCredentials, VoiceError> {
        let endpoint = self.endpoint(&["api", "voice", "session"]);
        let user_id = user_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("user-{}", Utc::now().timestamp_millis()));

        debug!("Requesting voice session for {} at {}", user_id, endpoint);

        let response = self
            .http
            .post(endpoint.clone())
            .json(&VoiceSessionRequest { user_id })
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = if status == StatusCode::NOT_FOUND {
                UnavailableKind::EndpointMissing
            } else {
                UnavailableKind::Status
            };

            return Err(VoiceError::BackendUnavailable {
                operation: BackendOperation::CreateSession,
                kind,
                status: status.as_u16(),
                body,
                endpoint: endpoint.to_string(),
            });
        }

        let credentials: SessionCredentials = response
            .json()
            .await
            .map_err(|e| VoiceError::InvalidResponse(e.to_string()))?;

        info!("Voice session created: room={}", credentials.room_name);

        Ok(credentials)
    }

    async fn end_session(&self, room_name: &str) -> Result<(), VoiceError> {
        let endpoint = self.endpoint(&["api", "voice", "session", room_name]);

        debug!("Ending voice session {} at {}", room_name, endpoint);

        let response = self
            .http
            .delete(endpoint.clone())
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Voice session {} was already gone", room_name);
            return Ok(());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::BackendUnavailable {
                operation: BackendOperation::EndSession,
                kind: UnavailableKind::Status,
                status: status.as_u16(),
                body,
                endpoint: endpoint.to_string(),
            });
        }

        info!("Voice session ended: room={}", room_name);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_segments_to_base_path() {
        let client = SessionClient::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(&["api", "voice", "session"]).as_str(),
            "http://localhost:8080/api/voice/session"
        );

        let prefixed =
            SessionClient::new("https://example.com/backend", Duration::from_secs(1)).unwrap();
        assert_eq!(
            prefixed.endpoint(&["api", "voice", "session", "room 1"]).as_str(),
            "https://example.com/backend/api/voice/session/room%201"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(SessionClient::new("not a url", Duration::from_secs(1)).is_err());
        assert!(SessionClient::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn base_url_has_no_trailing_slash() {
        let client = SessionClient::new("http://localhost:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
