use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Stable identifier of a track, derived from its file location.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        TrackId(value)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        TrackId(value.to_string())
    }
}

pub type PlaylistId = Uuid;

/// Identifier for the file at `path`. Pure function of the path string.
pub fn identify(path: &Path) -> TrackId {
    stable_id(&path.to_string_lossy())
}

/// 128-bit BLAKE3 prefix of `input`, formatted as a hyphenated UUID.
pub fn stable_id(input: &str) -> TrackId {
    let digest = blake3::hash(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    TrackId(Uuid::from_bytes(bytes).hyphenated().to_string())
}

/// Durations that are negative, NaN or infinite become 0.
pub fn clamp_duration(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        0.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artwork {
    pub data: Arc<[u8]>,
    pub mime: Option<String>,
}

impl Artwork {
    pub fn new(data: Vec<u8>, mime: Option<String>) -> Self {
        Self {
            data: data.into(),
            mime,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub location: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Seconds, always finite and non-negative.
    pub duration: f64,
    pub artwork: Option<Artwork>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub track_no: Option<u16>,
    pub disc_no: Option<u16>,
}

impl Track {
    /// Minimal track for `path` with placeholder metadata.
    pub fn placeholder(path: &Path) -> Self {
        Self {
            id: identify(path),
            location: path.to_path_buf(),
            title: file_stem(path),
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            duration: 0.0,
            artwork: None,
            year: None,
            genre: None,
            track_no: None,
            disc_no: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Album {
    pub artist: String,
    pub title: String,
    pub tracks: Vec<Track>,
    pub artwork: Option<Artwork>,
    pub year: Option<i32>,
    pub duration: f64,
}

impl Album {
    pub fn key(&self) -> (&str, &str) {
        (&self.artist, &self.title)
    }

    pub fn track_ids(&self) -> impl Iterator<Item = &TrackId> {
        self.tracks.iter().map(|track| &track.id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Artist {
    pub name: String,
    pub albums: Vec<Album>,
    pub image: Option<Artwork>,
}

impl Artist {
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.albums.iter().flat_map(|album| album.tracks.iter())
    }

    pub fn track_count(&self) -> usize {
        self.albums.iter().map(|album| album.tracks.len()).sum()
    }

    pub fn first_track(&self) -> Option<&Track> {
        self.tracks().next()
    }
}

/// User playlist. Id and creation time are fixed; name and tracks change.
#[derive(Clone, Debug, PartialEq)]
pub struct Playlist {
    id: PlaylistId,
    name: String,
    track_ids: Vec<TrackId>,
    created_at: OffsetDateTime,
}

impl Playlist {
    pub fn new(name: impl Into<String>, track_ids: Vec<TrackId>) -> Self {
        Self::from_parts(
            Uuid::new_v4(),
            name.into(),
            track_ids,
            OffsetDateTime::now_utc(),
        )
    }

    pub fn from_parts(
        id: PlaylistId,
        name: String,
        track_ids: Vec<TrackId>,
        created_at: OffsetDateTime,
    ) -> Self {
        let mut playlist = Self {
            id,
            name,
            track_ids: Vec::with_capacity(track_ids.len()),
            created_at,
        };
        for track_id in track_ids {
            playlist.push_track(track_id);
        }
        playlist
    }

    pub fn id(&self) -> PlaylistId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn track_ids(&self) -> &[TrackId] {
        &self.track_ids
    }

    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.track_ids.contains(track_id)
    }

    /// Appends `track_id` unless already present.
    pub fn push_track(&mut self, track_id: TrackId) -> bool {
        if self.contains(&track_id) {
            return false;
        }
        self.track_ids.push(track_id);
        true
    }

    pub fn remove_track(&mut self, track_id: &TrackId) -> bool {
        let before = self.track_ids.len();
        self.track_ids.retain(|id| id != track_id);
        self.track_ids.len() != before
    }

    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from >= self.track_ids.len() || to >= self.track_ids.len() {
            return false;
        }
        let track_id = self.track_ids.remove(from);
        self.track_ids.insert(to, track_id);
        true
    }
}

/// Anchors `path` at the working directory so one file always has one
/// location. Falls back to the path as given.
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown Track".to_string())
}
