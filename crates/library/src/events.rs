use common::{PlaylistId, TrackId};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Notifications published after every state change of the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum LibraryEvent {
    TracksAdded {
        added: usize,
        skipped: usize,
    },
    TrackRemoved {
        id: TrackId,
    },
    GroupingsRebuilt {
        tracks: usize,
        albums: usize,
        artists: usize,
    },
    PlaylistsChanged {
        id: PlaylistId,
    },
    PersistenceFailed {
        key: &'static str,
        message: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LibraryEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: LibraryEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
