use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{Playlist, Track, TrackId};
use metadata::{extract_with, ExtractError, ExtractOptions};
use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
    TransactionError,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SETTINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

pub const LIBRARY_KEY: &str = "library";
pub const PLAYLISTS_KEY: &str = "playlists";

/// Persisted form of a playlist. Tracks are referenced by id only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "trackIDs")]
    pub track_ids: Vec<TrackId>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl PlaylistRecord {
    pub fn from_playlist(playlist: &Playlist) -> Self {
        let created_at = playlist
            .created_at()
            .format(&Rfc3339)
            .unwrap_or_else(|_| playlist.created_at().unix_timestamp().to_string());
        Self {
            id: playlist.id().to_string(),
            name: playlist.name().to_string(),
            track_ids: playlist.track_ids().to_vec(),
            created_at,
        }
    }

    /// Rebuilds the playlist, keeping only tracks accepted by `is_live`.
    pub fn rehydrate(&self, is_live: impl Fn(&TrackId) -> bool) -> Option<Playlist> {
        let id = match Uuid::parse_str(&self.id) {
            Ok(id) => id,
            Err(err) => {
                warn!("Skipping playlist {:?} with invalid id: {}", self.name, err);
                return None;
            }
        };
        let created_at = OffsetDateTime::parse(&self.created_at, &Rfc3339).unwrap_or_else(|err| {
            warn!(
                "Playlist {:?} has unreadable timestamp {:?}: {}",
                self.name, self.created_at, err
            );
            OffsetDateTime::UNIX_EPOCH
        });
        let track_ids = self
            .track_ids
            .iter()
            .filter(|track_id| is_live(track_id))
            .cloned()
            .collect();
        Some(Playlist::from_parts(
            id,
            self.name.clone(),
            track_ids,
            created_at,
        ))
    }
}

/// Result of [`SettingsStore::load`].
#[derive(Debug, Default)]
pub struct LoadedState {
    pub tracks: Vec<Track>,
    pub playlists: Vec<Playlist>,
    pub missing: Vec<PathBuf>,
}

/// Application-scoped key-value settings store holding the `library` and
/// `playlists` blobs as JSON.
#[derive(Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
}

impl SettingsStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = open_or_create_db(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn from_db(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Writes both blobs in one transaction.
    pub fn save(&self, tracks: &[Track], playlists: &[Playlist]) -> Result<(), StoreError> {
        let library = encode_library(tracks)?;
        let playlists = encode_playlists(playlists)?;
        self.write_values(&[(LIBRARY_KEY, library), (PLAYLISTS_KEY, playlists)])
    }

    pub fn save_library(&self, tracks: &[Track]) -> Result<(), StoreError> {
        let bytes = encode_library(tracks)?;
        self.write_values(&[(LIBRARY_KEY, bytes)])
    }

    pub fn save_playlists(&self, playlists: &[Playlist]) -> Result<(), StoreError> {
        let bytes = encode_playlists(playlists)?;
        self.write_values(&[(PLAYLISTS_KEY, bytes)])
    }

    pub fn read_library(&self) -> Result<Vec<PathBuf>, StoreError> {
        let locations: Vec<String> = match self.read_value(LIBRARY_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        Ok(locations.into_iter().map(PathBuf::from).collect())
    }

    pub fn read_playlists(&self) -> Result<Vec<PlaylistRecord>, StoreError> {
        let records = match self.read_value(PLAYLISTS_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        Ok(records)
    }

    /// Restores the persisted state.
    ///
    /// Locations are re-extracted first; playlists are then filtered against
    /// the ids of the tracks that survived. Stored blobs are left untouched, so
    /// ids of vanished tracks stay on disk until the playlists are next saved.
    /// Unreadable blobs degrade to empty state.
    pub fn load(&self, options: &ExtractOptions) -> LoadedState {
        let locations = self.read_library().unwrap_or_else(|err| {
            warn!("Failed to read persisted library: {}", err);
            Vec::new()
        });

        let mut state = LoadedState::default();
        for location in locations {
            match extract_with(&location, options) {
                Ok(track) => state.tracks.push(track),
                Err(ExtractError::FileNotFound(path)) => {
                    debug!("Persisted track no longer on disk: {:?}", path);
                    state.missing.push(path);
                }
            }
        }

        let records = self.read_playlists().unwrap_or_else(|err| {
            warn!("Failed to read persisted playlists: {}", err);
            Vec::new()
        });
        let live: HashSet<&TrackId> = state.tracks.iter().map(|track| &track.id).collect();
        state.playlists = records
            .iter()
            .filter_map(|record| record.rehydrate(|id| live.contains(id)))
            .collect();

        info!(
            "Loaded {} tracks ({} missing) and {} playlists",
            state.tracks.len(),
            state.missing.len(),
            state.playlists.len()
        );
        state
    }

    fn read_value(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(SETTINGS_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let value = table.get(key)?.map(|value| value.value().to_vec());
        Ok(value)
    }

    fn write_values(&self, entries: &[(&str, Vec<u8>)]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS_TABLE)?;
            for (key, bytes) in entries {
                table.insert(*key, bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

fn encode_library(tracks: &[Track]) -> Result<Vec<u8>, StoreError> {
    let locations: Vec<String> = tracks
        .iter()
        .map(|track| track.location.to_string_lossy().to_string())
        .collect();
    Ok(serde_json::to_vec(&locations)?)
}

fn encode_playlists(playlists: &[Playlist]) -> Result<Vec<u8>, StoreError> {
    let records: Vec<PlaylistRecord> = playlists.iter().map(PlaylistRecord::from_playlist).collect();
    Ok(serde_json::to_vec(&records)?)
}

fn open_or_create_db(path: &Path) -> Result<Database, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Redb(redb::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "io error: {}", err),
            StoreError::Redb(err) => write!(f, "db error: {}", err),
            StoreError::Json(err) => write!(f, "json error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Redb(err) => Some(err),
            StoreError::Json(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json(err)
    }
}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Redb(err)
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<TableError> for StoreError {
    fn from(err: TableError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<CommitError> for StoreError {
    fn from(err: CommitError) -> Self {
        StoreError::Redb(err.into())
    }
}
