use super::events::{EventBus, Subscription};
use super::room::{
    DisconnectReason, Participant, RemoteTrack, Room, RoomConnector, RoomEvent, RoomEventKind,
};
use super::track::{AudioTrack, LocalAudioTrack, TrackSource};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Behaviour of rooms created by a [`LoopbackConnector`]
#[derive(Debug, Clone, Default)]
pub struct LoopbackOptions {
    /// Identity of a simulated remote participant that joins and publishes audio
    pub agent_identity: Option<String>,
    /// Mirror published microphone audio onto the agent's track
    pub echo: bool,
    /// Make `connect` fail with this message
    pub fail_connect: Option<String>,
    /// Make `publish_track` fail with this message
    pub fail_publish: Option<String>,
    /// Make `unpublish_track` fail with this message
    pub fail_unpublish: Option<String>,
}

impl LoopbackOptions {
    pub fn with_agent(identity: impl Into<String>) -> Self {
        Self {
            agent_identity: Some(identity.into()),
            ..Self::default()
        }
    }
}

/// In-process transport: every room lives in this process
#[derive(Default)]
pub struct LoopbackConnector {
    options: Mutex<LoopbackOptions>,
    rooms: Mutex<Vec<Arc<LoopbackRoom>>>,
}

impl LoopbackConnector {
    pub fn new(options: LoopbackOptions) -> Self {
        Self {
            options: Mutex::new(options),
            rooms: Mutex::new(Vec::new()),
        }
    }

    /// Options for rooms created from now on
    pub fn set_options(&self, options: LoopbackOptions) {
        *lock(&self.options) = options;
    }

    /// Every room created so far, oldest first
    pub fn rooms(&self) -> Vec<Arc<LoopbackRoom>> {
        lock(&self.rooms).clone()
    }

    pub fn last_room(&self) -> Option<Arc<LoopbackRoom>> {
        lock(&self.rooms).last().cloned()
    }
}

impl RoomConnector for LoopbackConnector {
    fn create_room(&self) -> Arc<dyn Room> {
        let options = lock(&self.options).clone();
        let mut rooms = lock(&self.rooms);

        let room = Arc::new(LoopbackRoom::new(rooms.len(), options));
        rooms.push(Arc::clone(&room));
        room
    }
}

#[derive(Default)]
struct LoopbackState {
    connected: bool,
    connect_calls: usize,
    publish_calls: usize,
    unpublish_calls: usize,
    credentials: Option<(String, String)>,
    /// Published track sid -> echo forwarder
    published: HashMap<String, Option<JoinHandle<()>>>,
    agent_track: Option<AudioTrack>,
}

/// A room whose only remote party is an optional simulated agent
pub struct LoopbackRoom {
    local: Participant,
    options: LoopbackOptions,
    events: EventBus,
    state: Mutex<LoopbackState>,
}

impl LoopbackRoom {
    fn new(index: usize, options: LoopbackOptions) -> Self {
        Self {
            local: Participant::new(format!("PA_local_{}", index), "local-user", "You"),
            options,
            events: EventBus::new(),
            state: Mutex::new(LoopbackState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        lock(&self.state)
    }

    /// Emit a remote event as if the server had sent it
    pub fn inject(&self, event: RoomEvent) -> usize {
        self.events.emit(event)
    }

    /// Simulate the server closing the room
    pub fn server_disconnect(&self) -> usize {
        self.close_media();
        self.events.emit(RoomEvent::Disconnected {
            reason: DisconnectReason::ServerShutdown,
        })
    }

    pub fn agent_participant(&self) -> Option<Participant> {
        self.options
            .agent_identity
            .as_ref()
            .map(|identity| Participant::new("PA_agent", identity.clone(), "Agent"))
    }

    pub fn agent_track(&self) -> Option<AudioTrack> {
        self.state().agent_track.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn connect_calls(&self) -> usize {
        self.state().connect_calls
    }

    pub fn publish_calls(&self) -> usize {
        self.state().publish_calls
    }

    pub fn unpublish_calls(&self) -> usize {
        self.state().unpublish_calls
    }

    pub fn published_tracks(&self) -> Vec<String> {
        self.state().published.keys().cloned().collect()
    }

    /// `(url, token)` of the last successful connect
    pub fn credentials(&self) -> Option<(String, String)> {
        self.state().credentials.clone()
    }

    pub fn subscriber_count(&self, kind: RoomEventKind) -> usize {
        self.events.subscriber_count(kind)
    }

    /// Mark disconnected and release echo tasks and the agent track
    fn close_media(&self) -> bool {
        let mut state = self.state();
        let was_connected = std::mem::replace(&mut state.connected, false);

        for (_, forwarder) in state.published.drain() {
            if let Some(task) = forwarder {
                task.abort();
            }
        }
        if let Some(track) = state.agent_track.take() {
            track.end();
        }

        was_connected
    }
}

#[async_trait::async_trait]
impl Room for LoopbackRoom {
    fn subscribe(&self, kinds: &[RoomEventKind]) -> Subscription {
        self.events.subscribe(kinds)
    }

    async fn connect(&self, url: &str, token: &str) -> Result<()> {
        {
            let mut state = self.state();
            state.connect_calls += 1;

            if let Some(message) = &self.options.fail_connect {
                anyhow::bail!("{}", message);
            }
            if state.connected {
                anyhow::bail!("Room is already connected");
            }

            state.connected = true;
            state.credentials = Some((url.to_string(), token.to_string()));
        }

        info!("Loopback room connected ({})", url);
        self.events.emit(RoomEvent::Connected);

        if let Some(agent) = self.agent_participant() {
            let track = AudioTrack::new("TR_agent_audio");
            self.state().agent_track = Some(track.clone());

            self.events.emit(RoomEvent::ParticipantConnected(agent.clone()));
            self.events.emit(RoomEvent::TrackSubscribed {
                track: RemoteTrack::Audio(track),
                participant: agent,
            });
        }

        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.close_media() {
            info!("Loopback room disconnected");
            self.events.emit(RoomEvent::Disconnected {
                reason: DisconnectReason::ClientInitiated,
            });
        }
        Ok(())
    }

    fn local_participant(&self) -> Participant {
        self.local.clone()
    }

    async fn publish_track(&self, track: &LocalAudioTrack, source: TrackSource) -> Result<()> {
        let mut state = self.state();
        state.publish_calls += 1;

        if !state.connected {
            anyhow::bail!("Room is not connected");
        }
        if let Some(message) = &self.options.fail_publish {
            anyhow::bail!("{}", message);
        }

        let forwarder = match (&state.agent_track, self.options.echo) {
            (Some(agent_track), true) => track
                .media_track()
                .subscribe()
                .map(|rx| tokio::spawn(echo(rx, agent_track.clone()))),
            _ => None,
        };

        debug!("Published {} as {:?}", track.sid(), source);
        state.published.insert(track.sid().to_string(), forwarder);

        Ok(())
    }

    async fn unpublish_track(&self, track_sid: &str) -> Result<()> {
        let mut state = self.state();
        state.unpublish_calls += 1;

        if let Some(message) = &self.options.fail_unpublish {
            anyhow::bail!("{}", message);
        }

        match state.published.remove(track_sid) {
            Some(forwarder) => {
                if let Some(task) = forwarder {
                    task.abort();
                }
                debug!("Unpublished {}", track_sid);
                Ok(())
            }
            None => anyhow::bail!("Track {} is not published", track_sid),
        }
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

async fn echo(mut rx: tokio::sync::broadcast::Receiver<super::track::AudioFrame>, target: AudioTrack) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                target.push(frame);
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!("Echo skipped {} frames", skipped);
            }
            Err(RecvError::Closed) => break,
        }

        if target.is_ended() {
            break;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
