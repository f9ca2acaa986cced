use super::room::{RoomEvent, RoomEventKind};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Receiving end of a room event subscription
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<RoomEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event, if any
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        self.rx.try_recv().ok()
    }
}

/// Subscription list per event kind
///
/// An event goes to the subscriptions registered for its kind at the moment
/// it is emitted; earlier events are never replayed.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<RoomEventKind, Vec<mpsc::UnboundedSender<RoomEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kinds: &[RoomEventKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for kind in kinds {
            subscribers.entry(*kind).or_default().push(tx.clone());
        }

        Subscription { rx }
    }

    /// Deliver `event` to current subscribers of its kind, returning how many got it
    pub fn emit(&self, event: RoomEvent) -> usize {
        let kind = event.kind();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let Some(list) = subscribers.get_mut(&kind) else {
            debug!("No subscribers for {:?}", kind);
            return 0;
        };

        // Dropped subscriptions are pruned as we go
        list.retain(|tx| tx.send(event.clone()).is_ok());
        list.len()
    }

    pub fn subscriber_count(&self, kind: RoomEventKind) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }
}
