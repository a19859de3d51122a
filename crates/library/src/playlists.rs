use std::sync::Arc;

use common::{Playlist, PlaylistId, TrackId};
use tracing::{info, warn};

use crate::events::{EventBus, LibraryEvent};
use crate::store::{SettingsStore, PLAYLISTS_KEY};
use crate::LibraryError;

/// User playlists. Every mutation replaces the shared vector and writes the
/// `playlists` blob straight away.
pub struct PlaylistStore {
    playlists: Arc<Vec<Playlist>>,
    store: SettingsStore,
    events: EventBus,
}

impl PlaylistStore {
    pub fn new(playlists: Vec<Playlist>, store: SettingsStore, events: EventBus) -> Self {
        Self {
            playlists: Arc::new(playlists),
            store,
            events,
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Playlist>> {
        Arc::clone(&self.playlists)
    }

    pub fn get(&self, id: PlaylistId) -> Option<&Playlist> {
        self.playlists.iter().find(|playlist| playlist.id() == id)
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    /// Creates a playlist. Duplicate ids in `initial_tracks` are dropped.
    ///
    /// On a write failure the playlist is kept in memory and the error is
    /// returned.
    pub fn create(
        &mut self,
        name: &str,
        initial_tracks: Vec<TrackId>,
    ) -> Result<Playlist, LibraryError> {
        let playlist = Playlist::new(name, initial_tracks);
        info!("Creating playlist {:?} ({})", playlist.name(), playlist.id());
        let mut next = self.playlists.as_ref().clone();
        next.push(playlist.clone());
        self.replace(next, playlist.id())?;
        Ok(playlist)
    }

    pub fn delete(&mut self, id: PlaylistId) -> Result<(), LibraryError> {
        if self.get(id).is_none() {
            return Err(LibraryError::UnknownPlaylist(id));
        }
        info!("Deleting playlist {}", id);
        let next = self
            .playlists
            .iter()
            .filter(|playlist| playlist.id() != id)
            .cloned()
            .collect();
        self.replace(next, id)
    }

    pub fn rename(&mut self, id: PlaylistId, name: &str) -> Result<(), LibraryError> {
        self.update(id, |playlist| {
            if playlist.name() == name {
                return false;
            }
            playlist.set_name(name);
            true
        })
    }

    /// Appends `track_id`; already present ids leave the playlist untouched.
    pub fn add_track(&mut self, id: PlaylistId, track_id: TrackId) -> Result<(), LibraryError> {
        self.update(id, |playlist| playlist.push_track(track_id))
    }

    pub fn remove_track(&mut self, id: PlaylistId, track_id: &TrackId) -> Result<(), LibraryError> {
        self.update(id, |playlist| playlist.remove_track(track_id))
    }

    pub fn move_track(&mut self, id: PlaylistId, from: usize, to: usize) -> Result<(), LibraryError> {
        self.update(id, |playlist| from != to && playlist.move_track(from, to))
    }

    /// Applies `change` to a copy of playlist `id`; persists only when it
    /// reports a modification.
    fn update(
        &mut self,
        id: PlaylistId,
        change: impl FnOnce(&mut Playlist) -> bool,
    ) -> Result<(), LibraryError> {
        let position = self
            .playlists
            .iter()
            .position(|playlist| playlist.id() == id)
            .ok_or(LibraryError::UnknownPlaylist(id))?;
        let mut next = self.playlists.as_ref().clone();
        if !change(&mut next[position]) {
            return Ok(());
        }
        self.replace(next, id)
    }

    fn replace(&mut self, next: Vec<Playlist>, changed: PlaylistId) -> Result<(), LibraryError> {
        self.playlists = Arc::new(next);
        self.events
            .publish(LibraryEvent::PlaylistsChanged { id: changed });
        self.persist()
    }

    fn persist(&self) -> Result<(), LibraryError> {
        if let Err(err) = self.store.save_playlists(&self.playlists) {
            warn!("Failed to persist playlists: {}", err);
            self.events.publish(LibraryEvent::PersistenceFailed {
                key: PLAYLISTS_KEY,
                message: err.to_string(),
            });
            return Err(LibraryError::PersistenceWrite(err));
        }
        Ok(())
    }
}
