use super::events::Subscription;
use super::track::{AudioTrack, LocalAudioTrack, TrackSource};
use anyhow::Result;
use std::sync::Arc;

/// An endpoint in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub sid: String,
    pub identity: String,
    pub name: String,
}

impl Participant {
    pub fn new(sid: impl Into<String>, identity: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            identity: identity.into(),
            name: name.into(),
        }
    }
}

/// A remote track this client has subscribed to
#[derive(Debug, Clone)]
pub enum RemoteTrack {
    Audio(AudioTrack),
    Video { sid: String },
}

impl RemoteTrack {
    pub fn sid(&self) -> &str {
        match self {
            RemoteTrack::Audio(track) => track.sid(),
            RemoteTrack::Video { sid } => sid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// This client asked to leave
    ClientInitiated,
    /// The server closed the room or removed the participant
    ServerShutdown,
    /// The transport gave up reconnecting
    ConnectionLost,
}

/// Lifecycle notifications emitted by a room
#[derive(Debug, Clone)]
pub enum RoomEvent {
    Connected,
    Reconnecting,
    Reconnected,
    Disconnected {
        reason: DisconnectReason,
    },
    ParticipantConnected(Participant),
    ParticipantDisconnected(Participant),
    TrackSubscribed {
        track: RemoteTrack,
        participant: Participant,
    },
    TrackUnsubscribed {
        track_sid: String,
        participant: Participant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomEventKind {
    Connected,
    Reconnecting,
    Reconnected,
    Disconnected,
    ParticipantConnected,
    ParticipantDisconnected,
    TrackSubscribed,
    TrackUnsubscribed,
}

impl RoomEventKind {
    pub const ALL: [RoomEventKind; 8] = [
        RoomEventKind::Connected,
        RoomEventKind::Reconnecting,
        RoomEventKind::Reconnected,
        RoomEventKind::Disconnected,
        RoomEventKind::ParticipantConnected,
        RoomEventKind::ParticipantDisconnected,
        RoomEventKind::TrackSubscribed,
        RoomEventKind::TrackUnsubscribed,
    ];
}

impl RoomEvent {
    pub fn kind(&self) -> RoomEventKind {
        match self {
            RoomEvent::Connected => RoomEventKind::Connected,
            RoomEvent::Reconnecting => RoomEventKind::Reconnecting,
            RoomEvent::Reconnected => RoomEventKind::Reconnected,
            RoomEvent::Disconnected { .. } => RoomEventKind::Disconnected,
            RoomEvent::ParticipantConnected(_) => RoomEventKind::ParticipantConnected,
            RoomEvent::ParticipantDisconnected(_) => RoomEventKind::ParticipantDisconnected,
            RoomEvent::TrackSubscribed { .. } => RoomEventKind::TrackSubscribed,
            RoomEvent::TrackUnsubscribed { .. } => RoomEventKind::TrackUnsubscribed,
        }
    }
}

/// Connection to one server-mediated room
///
/// Events are only delivered to subscriptions that exist when they are
/// emitted, so callers must subscribe before calling `connect`.
#[async_trait::async_trait]
pub trait Room: Send + Sync {
    /// Register for the given event kinds
    fn subscribe(&self, kinds: &[RoomEventKind]) -> Subscription;

    /// Join the room at `url` using `token`
    async fn connect(&self, url: &str, token: &str) -> Result<()>;

    /// Leave the room
    async fn disconnect(&self) -> Result<()>;

    /// This client's own participant
    fn local_participant(&self) -> Participant;

    async fn publish_track(&self, track: &LocalAudioTrack, source: TrackSource) -> Result<()>;

    async fn unpublish_track(&self, track_sid: &str) -> Result<()>;

    /// Transport name for logging
    fn name(&self) -> &str;
}

/// Creates fresh room handles, one per connection attempt
pub trait RoomConnector: Send + Sync {
    fn create_room(&self) -> Arc<dyn Room>;
}
