pub mod config;
pub mod events;
pub mod index;
pub mod playback;
pub mod playlists;
pub mod query;
pub mod scan;
pub mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{Album, Artist, Playlist, PlaylistId, Track, TrackId};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub use config::{ConfigError, LibraryConfig};
pub use events::{EventBus, LibraryEvent};
pub use index::{AddOutcome, IndexOptions, LibraryIndex};
pub use playback::{PlayQueue, PlaybackSession, PlaybackStatus, RepeatMode, Transport};
pub use playlists::PlaylistStore;
pub use scan::{ScanFailure, ScanHandle, ScanOptions, ScanProgress, ScanReport};
pub use store::{LoadedState, SettingsStore, StoreError, LIBRARY_KEY};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The library engine: track index, playlists and their persistence.
///
/// The owner is the only writer. Scans run on the blocking pool and their
/// reports are merged back here in one step.
pub struct MusicLibrary {
    index: LibraryIndex,
    playlists: PlaylistStore,
    store: SettingsStore,
    scan_options: ScanOptions,
    events: EventBus,
}

impl MusicLibrary {
    /// Restores persisted state. Stored locations are re-extracted on the
    /// blocking pool; unreadable state degrades to an empty library.
    pub async fn open(store: SettingsStore, config: &LibraryConfig) -> Result<Self, LibraryError> {
        let loader = store.clone();
        let options = config.extract_options();
        let state = tokio::task::spawn_blocking(move || loader.load(&options))
            .await
            .map_err(|err| LibraryError::ScanJoin(err.to_string()))?;
        Ok(Self::from_state(store, config, state))
    }

    /// Opens the settings database named by `config`, resolved against
    /// `config_path`.
    pub async fn open_path(
        config_path: &Path,
        config: &LibraryConfig,
    ) -> Result<Self, LibraryError> {
        let settings_path = config::resolve_path(config_path, &config.settings_path);
        info!("Opening settings store {:?}", settings_path);
        let store = SettingsStore::open(&settings_path).map_err(LibraryError::PersistenceRead)?;
        Self::open(store, config).await
    }

    fn from_state(store: SettingsStore, config: &LibraryConfig, state: LoadedState) -> Self {
        let LoadedState {
            tracks,
            playlists,
            missing,
        } = state;
        if !missing.is_empty() {
            info!("{} persisted tracks are no longer on disk", missing.len());
        }

        let events = EventBus::new();
        let mut index = LibraryIndex::new(config.index_options());
        index.add_tracks(tracks);

        Self {
            index,
            playlists: PlaylistStore::new(playlists, store.clone(), events.clone()),
            store,
            scan_options: config.scan_options(),
            events,
        }
    }

    pub fn tracks(&self) -> Arc<Vec<Track>> {
        self.index.tracks()
    }

    pub fn albums(&self) -> Arc<Vec<Album>> {
        self.index.albums()
    }

    pub fn artists(&self) -> Arc<Vec<Artist>> {
        self.index.artists()
    }

    pub fn playlists(&self) -> Arc<Vec<Playlist>> {
        self.playlists.snapshot()
    }

    pub fn index(&self) -> &LibraryIndex {
        &self.index
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.index.track(id)
    }

    pub fn scan_options(&self) -> &ScanOptions {
        &self.scan_options
    }

    pub fn search(&self, query: &str) -> Vec<Track> {
        self.index.search(query)
    }

    pub fn search_albums(&self, query: &str) -> Vec<Album> {
        query::search_albums(&self.index.albums(), query)
    }

    pub fn search_artists(&self, query: &str) -> Vec<Artist> {
        query::search_artists(&self.index.artists(), query)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Starts a scan of `root` on the blocking pool.
    pub fn spawn_scan(&self, root: PathBuf) -> ScanHandle {
        info!("Scanning {:?}", root);
        scan::spawn_scan(root, self.scan_options.clone())
    }

    pub fn spawn_import(&self, paths: Vec<PathBuf>) -> ScanHandle {
        info!("Importing {} files", paths.len());
        scan::spawn_import(paths, self.scan_options.clone())
    }

    /// Adds every track of `report` in one step and persists the locations.
    ///
    /// A write failure leaves the merged tracks in memory and is returned as
    /// [`LibraryError::PersistenceWrite`].
    pub fn merge_scan(&mut self, report: ScanReport) -> Result<MergeSummary, LibraryError> {
        for failure in &report.failures {
            warn!("Import failed: {}", failure);
        }
        let failed = report.failures.len();
        let AddOutcome { added, skipped } = self.index.add_tracks(report.tracks);
        let summary = MergeSummary {
            added,
            skipped,
            failed,
        };
        info!(
            "Merged scan: {} added, {} skipped, {} failed",
            summary.added, summary.skipped, summary.failed
        );

        self.events
            .publish(LibraryEvent::TracksAdded { added, skipped });
        if added > 0 {
            self.publish_groupings();
            self.persist_library()?;
        }
        Ok(summary)
    }

    pub async fn scan_directory(&mut self, root: PathBuf) -> Result<MergeSummary, LibraryError> {
        let report = self.spawn_scan(root).wait().await?;
        self.merge_scan(report)
    }

    pub async fn add_files(&mut self, paths: Vec<PathBuf>) -> Result<MergeSummary, LibraryError> {
        let report = self.spawn_import(paths).wait().await?;
        self.merge_scan(report)
    }

    /// Removes a track from the library. Playlists keep the id until the next
    /// load filters it out.
    pub fn remove_track(&mut self, id: &TrackId) -> Result<Track, LibraryError> {
        let removed = self
            .index
            .remove_track(id)
            .ok_or_else(|| LibraryError::UnknownTrack(id.clone()))?;
        info!("Removed track {:?}", removed.location);
        self.events
            .publish(LibraryEvent::TrackRemoved { id: id.clone() });
        self.publish_groupings();
        self.persist_library()?;
        Ok(removed)
    }

    /// Writes both the library and playlists blobs.
    pub fn save(&self) -> Result<(), LibraryError> {
        let playlists = self.playlists.snapshot();
        self.store
            .save(&self.index.tracks(), &playlists)
            .map_err(|err| {
                warn!("Failed to save library state: {}", err);
                LibraryError::PersistenceWrite(err)
            })
    }

    /// Playlist members resolved against the live index, in playlist order.
    pub fn playlist_tracks(&self, id: PlaylistId) -> Result<Vec<Track>, LibraryError> {
        let playlist = self
            .playlists
            .get(id)
            .ok_or(LibraryError::UnknownPlaylist(id))?;
        Ok(playlist
            .track_ids()
            .iter()
            .filter_map(|track_id| self.index.track(track_id).cloned())
            .collect())
    }

    pub fn create_playlist(
        &mut self,
        name: &str,
        initial_tracks: Vec<TrackId>,
    ) -> Result<Playlist, LibraryError> {
        for track_id in &initial_tracks {
            self.require_track(track_id)?;
        }
        self.playlists.create(name, initial_tracks)
    }

    pub fn delete_playlist(&mut self, id: PlaylistId) -> Result<(), LibraryError> {
        self.playlists.delete(id)
    }

    pub fn rename_playlist(&mut self, id: PlaylistId, name: &str) -> Result<(), LibraryError> {
        self.playlists.rename(id, name)
    }

    pub fn add_to_playlist(&mut self, id: PlaylistId, track_id: TrackId) -> Result<(), LibraryError> {
        self.require_track(&track_id)?;
        self.playlists.add_track(id, track_id)
    }

    pub fn remove_from_playlist(
        &mut self,
        id: PlaylistId,
        track_id: &TrackId,
    ) -> Result<(), LibraryError> {
        self.playlists.remove_track(id, track_id)
    }

    pub fn move_in_playlist(
        &mut self,
        id: PlaylistId,
        from: usize,
        to: usize,
    ) -> Result<(), LibraryError> {
        self.playlists.move_track(id, from, to)
    }

    fn require_track(&self, track_id: &TrackId) -> Result<(), LibraryError> {
        if self.index.contains(track_id) {
            Ok(())
        } else {
            Err(LibraryError::UnknownTrack(track_id.clone()))
        }
    }

    fn publish_groupings(&self) {
        self.events.publish(LibraryEvent::GroupingsRebuilt {
            tracks: self.index.len(),
            albums: self.index.albums().len(),
            artists: self.index.artists().len(),
        });
    }

    fn persist_library(&self) -> Result<(), LibraryError> {
        if let Err(err) = self.store.save_library(&self.index.tracks()) {
            warn!("Failed to persist library: {}", err);
            self.events.publish(LibraryEvent::PersistenceFailed {
                key: LIBRARY_KEY,
                message: err.to_string(),
            });
            return Err(LibraryError::PersistenceWrite(err));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    PersistenceRead(StoreError),
    PersistenceWrite(StoreError),
    UnknownPlaylist(PlaylistId),
    UnknownTrack(TrackId),
    ScanJoin(String),
    Config(ConfigError),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::PersistenceRead(err) => write!(f, "failed to read settings: {}", err),
            LibraryError::PersistenceWrite(err) => write!(f, "failed to write settings: {}", err),
            LibraryError::UnknownPlaylist(id) => write!(f, "unknown playlist: {}", id),
            LibraryError::UnknownTrack(id) => write!(f, "unknown track: {}", id),
            LibraryError::ScanJoin(message) => write!(f, "background task failed: {}", message),
            LibraryError::Config(err) => write!(f, "config error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<ConfigError> for LibraryError {
    fn from(err: ConfigError) -> Self {
        LibraryError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    use redb::backends::InMemoryBackend;
    use redb::{Database, StorageBackend};
    use tempfile::{tempdir, TempDir};

    use super::*;

    /// In-memory redb backend whose writes can be switched off.
    #[derive(Debug)]
    struct FailingBackend {
        inner: InMemoryBackend,
        fail_writes: Arc<AtomicBool>,
    }

    impl FailingBackend {
        fn check(&self) -> Result<(), io::Error> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            Ok(())
        }
    }

    impl StorageBackend for FailingBackend {
        fn len(&self) -> Result<u64, io::Error> {
            self.inner.len()
        }

        fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>, io::Error> {
            self.inner.read(offset, len)
        }

        fn set_len(&self, len: u64) -> Result<(), io::Error> {
            self.check()?;
            self.inner.set_len(len)
        }

        fn sync_data(&self, eventual: bool) -> Result<(), io::Error> {
            self.check()?;
            self.inner.sync_data(eventual)
        }

        fn write(&self, offset: u64, data: &[u8]) -> Result<(), io::Error> {
            self.check()?;
            self.inner.write(offset, data)
        }
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"not real audio").unwrap();
    }

    async fn open_library() -> (TempDir, MusicLibrary) {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(&dir.path().join("settings.redb")).unwrap();
        let library = MusicLibrary::open(store, &LibraryConfig::default())
            .await
            .unwrap();
        (dir, library)
    }

    #[tokio::test]
    async fn scan_merges_and_publishes() {
        let (dir, mut library) = open_library().await;
        let root = dir.path().join("Music");
        touch(&root.join("Portishead").join("Dummy").join("Portishead - Roads.mp3"));
        touch(&root.join("notes.txt"));
        let mut events = library.subscribe();

        let summary = library.scan_directory(root.clone()).await.unwrap();
        assert_eq!(
            summary,
            MergeSummary {
                added: 1,
                skipped: 0,
                failed: 0
            }
        );
        let tracks = library.tracks();
        assert_eq!(tracks[0].artist, "Portishead");
        assert_eq!(tracks[0].album, "Dummy");

        assert_eq!(
            events.try_recv().unwrap(),
            LibraryEvent::TracksAdded {
                added: 1,
                skipped: 0
            }
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            LibraryEvent::GroupingsRebuilt { tracks: 1, .. }
        ));
    }

    #[tokio::test]
    async fn add_files_reports_rejections() {
        let (dir, mut library) = open_library().await;
        let song = dir.path().join("a.flac");
        let image = dir.path().join("cover.png");
        touch(&song);
        touch(&image);

        let summary = library.add_files(vec![song, image]).await.unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn merge_returns_library_write_failure() {
        let dir = tempdir().unwrap();
        let fail_writes = Arc::new(AtomicBool::new(false));
        let backend = FailingBackend {
            inner: InMemoryBackend::new(),
            fail_writes: Arc::clone(&fail_writes),
        };
        let db = Database::builder().create_with_backend(backend).unwrap();
        let store = SettingsStore::from_db(Arc::new(db));
        let mut library = MusicLibrary::open(store, &LibraryConfig::default())
            .await
            .unwrap();
        let mut events = library.subscribe();

        let song = dir.path().join("a.mp3");
        touch(&song);
        fail_writes.store(true, Ordering::SeqCst);

        let result = library.add_files(vec![song.clone()]).await;
        assert!(matches!(result, Err(LibraryError::PersistenceWrite(_))));
        assert!(library.index().contains_location(&song));

        let mut reported = false;
        while let Ok(event) = events.try_recv() {
            if let LibraryEvent::PersistenceFailed { key, .. } = event {
                assert_eq!(key, LIBRARY_KEY);
                reported = true;
            }
        }
        assert!(reported);
    }

    #[tokio::test]
    async fn playlist_commands_validate_tracks() {
        let (dir, mut library) = open_library().await;
        let song = dir.path().join("a.mp3");
        touch(&song);
        let track = metadata::extract(&song).unwrap();
        library
            .merge_scan(ScanReport {
                root: None,
                tracks: vec![track.clone()],
                failures: Vec::new(),
            })
            .unwrap();

        let ghost = TrackId::from("ghost");
        assert!(matches!(
            library.create_playlist("Mix", vec![ghost.clone()]),
            Err(LibraryError::UnknownTrack(_))
        ));

        let playlist = library.create_playlist("Mix", Vec::new()).unwrap();
        assert!(matches!(
            library.add_to_playlist(playlist.id(), ghost),
            Err(LibraryError::UnknownTrack(_))
        ));
        library
            .add_to_playlist(playlist.id(), track.id.clone())
            .unwrap();
        let members = library.playlist_tracks(playlist.id()).unwrap();
        assert_eq!(members, vec![track.clone()]);

        library.remove_track(&track.id).unwrap();
        assert!(library.playlist_tracks(playlist.id()).unwrap().is_empty());
        assert!(matches!(
            library.remove_track(&track.id),
            Err(LibraryError::UnknownTrack(_))
        ));
    }
}
