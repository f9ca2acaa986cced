use super::agent::is_agent;
use super::state::{ConnectionState, LiveSession, RecordingState};
use super::surface::{SessionSnapshot, SessionSurface};
use crate::backend::SessionApi;
use crate::config::{Config, MonitorConfig};
use crate::error::VoiceError;
use crate::media::{
    AudioCapture, AudioTrack, CaptureOptions, Participant, RemoteTrack, Room, RoomConnector,
    RoomEvent, RoomEventKind, Subscription, TrackSource,
};
use crate::monitor::{AudioLevelMonitor, MonitorHandle, Slot, SpeakingSink};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Per-manager settings
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    /// User id sent on session creation (generated per session when absent)
    pub user_id: Option<String>,
    pub capture: CaptureOptions,
    pub monitor: MonitorConfig,
}

impl From<&Config> for ManagerOptions {
    fn from(config: &Config) -> Self {
        Self {
            user_id: config.backend.user_id.clone(),
            capture: CaptureOptions::from(&config.capture),
            monitor: config.monitor.clone(),
        }
    }
}

/// Drives one voice session: backend credentials, room connection,
/// microphone publishing and both speaking indicators.
///
/// Commands never fail towards the caller; failures land on the surface as
/// an error message. Commands are serialized, so a toggle issued while
/// another is in flight runs after it against the settled state.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

struct Shared {
    api: Arc<dyn SessionApi>,
    connector: Arc<dyn RoomConnector>,
    capture: Arc<dyn AudioCapture>,
    monitor: AudioLevelMonitor,
    surface: SessionSurface,
    options: ManagerOptions,
    live: Mutex<LiveSession>,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn SessionApi>,
        connector: Arc<dyn RoomConnector>,
        capture: Arc<dyn AudioCapture>,
        options: ManagerOptions,
    ) -> Self {
        let surface = SessionSurface::new();
        let monitor = AudioLevelMonitor::new(options.monitor.clone(), Arc::new(surface.clone()));

        Self {
            shared: Arc::new(Shared {
                api,
                connector,
                capture,
                monitor,
                surface,
                options,
                live: Mutex::new(LiveSession::default()),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.surface.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.surface.watch()
    }

    pub fn surface(&self) -> &SessionSurface {
        &self.shared.surface
    }

    /// The monitor factory, for inspecting active/started counts
    pub fn monitor(&self) -> &AudioLevelMonitor {
        &self.shared.monitor
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.shared.live.lock().await.connection
    }

    pub async fn recording_state(&self) -> RecordingState {
        self.shared.live.lock().await.recording
    }

    /// Obtain credentials and join the room. No-op while a room is active.
    pub async fn connect(&self) {
        let mut live = self.shared.live.lock().await;
        self.shared.connect(&mut live).await;
    }

    /// Release every session resource. Safe to call in any state.
    pub async fn disconnect(&self) {
        let mut live = self.shared.live.lock().await;
        self.shared.disconnect(&mut live).await;
    }

    /// Start or stop publishing the microphone; connects instead when no
    /// room is active.
    pub async fn toggle_recording(&self) {
        let mut live = self.shared.live.lock().await;
        self.shared.toggle_recording(&mut live).await;
    }
}

impl Shared {
    async fn connect(self: &Arc<Self>, live: &mut LiveSession) {
        if live.room.is_some() {
            debug!("Connect ignored: a room is already active");
            return;
        }

        self.surface.set_error(None);
        live.connection = ConnectionState::Connecting;
        self.sync(live);

        let credentials = match self.api.create_session(self.options.user_id.as_deref()).await {
            Ok(credentials) => credentials,
            Err(e) => {
                self.fail_connect(live, e);
                return;
            }
        };

        let room = self.connector.create_room();
        // Installed before connecting so no early event is missed
        let mut subscription = room.subscribe(&RoomEventKind::ALL);
        let attempt = Uuid::new_v4();
        live.attempt = Some(attempt);

        info!(
            "Connecting to room {} via {} transport (attempt {})",
            credentials.room_name,
            room.name(),
            attempt
        );

        if let Err(e) = room.connect(&credentials.url, &credentials.token).await {
            live.attempt = None;
            if let Err(end_err) = self.api.end_session(&credentials.room_name).await {
                warn!(
                    "Failed to end voice session {}: {}",
                    credentials.room_name, end_err
                );
            }
            self.fail_connect(live, VoiceError::RemoteConnectFailed(format!("{:#}", e)));
            return;
        }

        live.local_participant = Some(room.local_participant());
        live.room = Some(room);
        live.credentials = Some(credentials);

        // Events produced during the connect call itself
        while let Some(event) = subscription.try_recv() {
            self.apply_event(live, attempt, event);
        }

        if live.is_current(attempt) {
            let shared = Arc::clone(self);
            live.event_task = Some(tokio::spawn(shared.event_loop(attempt, subscription)));
        }

        self.sync(live);
    }

    async fn event_loop(self: Arc<Self>, attempt: Uuid, mut subscription: Subscription) {
        while let Some(event) = subscription.recv().await {
            let mut live = self.live.lock().await;
            self.apply_event(&mut live, attempt, event);

            if !live.is_current(attempt) {
                break;
            }
        }
        debug!("Room event loop for attempt {} finished", attempt);
    }

    async fn disconnect(&self, live: &mut LiveSession) {
        let room = live.room.take();
        let credentials = live.credentials.take();

        if room.is_some() {
            live.connection = ConnectionState::Disconnecting;
            self.sync(live);
        }

        // Anything the room still emits from here on is stale
        live.attempt = None;
        if let Some(task) = live.event_task.take() {
            task.abort();
        }
        live.release_media();
        live.local_participant = None;

        if let Some(room) = room {
            if let Err(e) = room.disconnect().await {
                warn!("Failed to leave room cleanly: {:#}", e);
            }
        }

        if let Some(credentials) = credentials {
            if let Err(e) = self.api.end_session(&credentials.room_name).await {
                warn!(
                    "Failed to end voice session {}: {}",
                    credentials.room_name, e
                );
            }
            info!("Voice session {} disconnected", credentials.room_name);
        }

        self.reset(live);
    }

    async fn toggle_recording(self: &Arc<Self>, live: &mut LiveSession) {
        let Some(room) = live.room.clone() else {
            info!("No active room; connecting instead of recording");
            self.connect(live).await;
            return;
        };

        if live.connection != ConnectionState::Connected {
            warn!("Recording toggle ignored while {:?}", live.connection);
            return;
        }

        self.surface.set_error(None);

        match live.recording {
            RecordingState::Recording => self.stop_recording(live, room.as_ref()).await,
            RecordingState::Idle => self.start_recording(live, room.as_ref()).await,
            other => warn!("Recording toggle ignored while {:?}", other),
        }

        self.sync(live);
    }

    async fn start_recording(&self, live: &mut LiveSession, room: &dyn Room) {
        live.recording = RecordingState::Publishing;

        let mut track = match self
            .capture
            .create_local_audio_track(&self.options.capture)
            .await
        {
            Ok(track) => track,
            Err(e) => {
                live.recording = RecordingState::Idle;
                self.fail(VoiceError::MediaAcquisitionFailed(format!("{:#}", e)));
                return;
            }
        };

        if let Err(e) = room.publish_track(&track, TrackSource::Microphone).await {
            track.stop();
            live.recording = RecordingState::Idle;
            self.fail(VoiceError::PublishFailed(format!("{:#}", e)));
            return;
        }

        replace_monitor(
            &self.monitor,
            &mut live.user_monitor,
            track.media_track(),
            Slot::User,
        );

        info!("Recording started on track {}", track.sid());
        live.local_track = Some(track);
        live.recording = RecordingState::Recording;
    }

    async fn stop_recording(&self, live: &mut LiveSession, room: &dyn Room) {
        live.recording = RecordingState::Unpublishing;

        if let Some(track) = live.local_track.as_ref() {
            if let Err(e) = room.unpublish_track(track.sid()).await {
                live.recording = RecordingState::Recording;
                self.fail(VoiceError::UnpublishFailed(format!("{:#}", e)));
                return;
            }
        }

        if let Some(mut track) = live.local_track.take() {
            track.stop();
        }
        if let Some(mut monitor) = live.user_monitor.take() {
            monitor.stop();
        }
        self.surface.set_speaking(Slot::User, false);

        live.recording = RecordingState::Idle;
        info!("Recording stopped");
    }

    fn apply_event(&self, live: &mut LiveSession, attempt: Uuid, event: RoomEvent) {
        if !live.is_current(attempt) {
            debug!("Dropping stale {:?} event from attempt {}", event.kind(), attempt);
            return;
        }

        match event {
            RoomEvent::Connected | RoomEvent::Reconnected => {
                info!("Room connected");
                live.connection = ConnectionState::Connected;
            }
            RoomEvent::Reconnecting => {
                warn!("Room connection interrupted, reconnecting");
                live.connection = ConnectionState::Connecting;
            }
            RoomEvent::Disconnected { reason } => {
                info!("Room disconnected by remote: {:?}", reason);
                self.teardown_remote(live);
            }
            RoomEvent::ParticipantConnected(participant) => {
                if is_agent(&participant) {
                    info!("Agent {} joined the room", participant.identity);
                    live.agent_sid = Some(participant.sid);
                }
            }
            RoomEvent::ParticipantDisconnected(participant) => {
                if live.agent_sid.as_deref() == Some(participant.sid.as_str()) {
                    info!("Agent {} left the room", participant.identity);
                    live.agent_sid = None;
                }
                if live.ai_participant_sid.as_deref() == Some(participant.sid.as_str()) {
                    stop_ai_monitor(live);
                }
            }
            RoomEvent::TrackSubscribed { track, participant } => {
                self.on_track_subscribed(live, track, participant);
            }
            RoomEvent::TrackUnsubscribed { track_sid, .. } => {
                let monitored = live
                    .ai_monitor
                    .as_ref()
                    .is_some_and(|monitor| monitor.track_sid() == track_sid);
                if monitored {
                    stop_ai_monitor(live);
                }
            }
        }

        self.sync(live);
    }

    fn on_track_subscribed(&self, live: &mut LiveSession, track: RemoteTrack, participant: Participant) {
        let is_local = live
            .local_participant
            .as_ref()
            .is_some_and(|local| local.sid == participant.sid);
        if is_local {
            return;
        }

        let audio = match track {
            RemoteTrack::Audio(audio) => audio,
            RemoteTrack::Video { sid } => {
                debug!("Ignoring video track {} from {}", sid, participant.identity);
                return;
            }
        };

        // Once an agent is known only its audio drives the ai indicator
        let from_agent = is_agent(&participant)
            || live.agent_sid.as_deref() == Some(participant.sid.as_str());
        if live.agent_sid.is_some() && !from_agent {
            debug!(
                "Ignoring audio from {}: not the agent",
                participant.identity
            );
            return;
        }
        if from_agent && live.agent_sid.is_none() {
            live.agent_sid = Some(participant.sid.clone());
        }

        replace_monitor(&self.monitor, &mut live.ai_monitor, &audio, Slot::Ai);
        live.ai_participant_sid = Some(participant.sid);
    }

    /// The room went away on its own: release local media and forget it
    fn teardown_remote(&self, live: &mut LiveSession) {
        live.attempt = None;
        live.release_media();
        // The event loop exits by itself now that its attempt is stale
        live.event_task = None;
        live.room = None;
        live.local_participant = None;

        if let Some(credentials) = live.credentials.take() {
            let api = Arc::clone(&self.api);
            tokio::spawn(async move {
                if let Err(e) = api.end_session(&credentials.room_name).await {
                    warn!(
                        "Failed to end voice session {}: {}",
                        credentials.room_name, e
                    );
                }
            });
        }

        self.reset(live);
    }

    fn fail_connect(&self, live: &mut LiveSession, err: VoiceError) {
        live.connection = ConnectionState::Disconnected;
        self.fail(err);
        self.sync(live);
    }

    fn fail(&self, err: VoiceError) {
        error!("{}", err);
        self.surface.set_error(Some(err.to_string()));
    }

    /// Back to the idle defaults; the error message is kept for display
    fn reset(&self, live: &mut LiveSession) {
        live.connection = ConnectionState::Disconnected;
        live.recording = RecordingState::Idle;
        live.agent_sid = None;
        live.ai_participant_sid = None;

        self.surface.update(|s| {
            s.user_speaking = false;
            s.ai_speaking = false;
        });
        self.sync(live);
    }

    fn sync(&self, live: &LiveSession) {
        let room_name = live.credentials.as_ref().map(|c| c.room_name.clone());
        self.surface.update(|s| {
            s.is_connected = live.connection == ConnectionState::Connected;
            s.is_recording = matches!(
                live.recording,
                RecordingState::Recording | RecordingState::Unpublishing
            );
            s.agent_present = live.agent_sid.is_some();
            s.room_name = room_name;
        });
    }
}

/// Stop whatever `slot` was monitoring, then monitor `track` instead
fn replace_monitor(
    monitor: &AudioLevelMonitor,
    handle: &mut Option<MonitorHandle>,
    track: &AudioTrack,
    slot: Slot,
) {
    if let Some(mut previous) = handle.take() {
        previous.stop();
    }

    match monitor.start(track, slot) {
        Ok(started) => *handle = Some(started),
        Err(e) => warn!("No {} speaking indicator: {}", slot, e),
    }
}

fn stop_ai_monitor(live: &mut LiveSession) {
    if let Some(mut monitor) = live.ai_monitor.take() {
        monitor.stop();
    }
    live.ai_participant_sid = None;
}
