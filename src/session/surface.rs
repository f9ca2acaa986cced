use crate::monitor::{Slot, SpeakingSink};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// What the presentation layer can observe about the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub is_connected: bool,
    pub is_recording: bool,
    pub user_speaking: bool,
    pub ai_speaking: bool,
    /// Human-readable message of the last failed operation
    pub error: Option<String>,
    /// Whether a remote agent participant is in the room
    pub agent_present: bool,
    pub room_name: Option<String>,
}

/// Reactive surface: the session manager writes, observers read
#[derive(Clone)]
pub struct SessionSurface {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionSurface {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver notified whenever the snapshot changes
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Apply `f`, notifying observers only if something changed
    pub(crate) fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        self.tx.send_if_modified(|snapshot| {
            let before = snapshot.clone();
            f(snapshot);
            *snapshot != before
        });
    }

    pub(crate) fn set_error(&self, message: Option<String>) {
        self.update(|s| s.error = message);
    }
}

impl Default for SessionSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeakingSink for SessionSurface {
    fn set_speaking(&self, slot: Slot, speaking: bool) {
        self.update(|s| match slot {
            Slot::User => s.user_speaking = speaking,
            Slot::Ai => s.ai_speaking = speaking,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_updates_do_not_notify() {
        let surface = SessionSurface::new();
        let mut rx = surface.watch();

        surface.set_speaking(Slot::Ai, false);
        assert!(!rx.has_changed().unwrap());

        surface.set_speaking(Slot::Ai, true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().ai_speaking);
        assert!(!surface.snapshot().user_speaking);
    }
}
