use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{Album, Artist, Artwork, Track, TrackId};
use metadata::{find_artist_image, load_artwork, ARTWORK_SEARCH_DEPTH};
use tracing::debug;

use crate::query;

#[derive(Clone, Debug)]
pub struct IndexOptions {
    pub artist_image_depth: usize,
    pub resolve_artist_images: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            artist_image_depth: ARTWORK_SEARCH_DEPTH,
            resolve_artist_images: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    pub skipped: usize,
}

/// Canonical track set plus the album and artist groupings derived from it.
///
/// Snapshots are handed out as `Arc`s; mutation clones the backing vector only
/// when a snapshot is still alive.
#[derive(Clone, Debug, Default)]
pub struct LibraryIndex {
    tracks: Arc<Vec<Track>>,
    albums: Arc<Vec<Album>>,
    artists: Arc<Vec<Artist>>,
    locations: HashSet<PathBuf>,
    positions: HashMap<TrackId, usize>,
    artist_images: HashMap<String, Option<Artwork>>,
    options: IndexOptions,
}

impl LibraryIndex {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Appends tracks whose location is not indexed yet, keeping first-seen
    /// order. Groupings are rebuilt only when something was added.
    pub fn add_tracks(&mut self, incoming: impl IntoIterator<Item = Track>) -> AddOutcome {
        let mut outcome = AddOutcome::default();
        {
            let tracks = Arc::make_mut(&mut self.tracks);
            for track in incoming {
                if !self.locations.insert(track.location.clone()) {
                    outcome.skipped += 1;
                    continue;
                }
                self.positions.insert(track.id.clone(), tracks.len());
                tracks.push(track);
                outcome.added += 1;
            }
        }
        if outcome.skipped > 0 {
            debug!("Skipped {} already indexed tracks", outcome.skipped);
        }
        if outcome.added > 0 {
            self.rebuild_groupings();
        }
        outcome
    }

    pub fn remove_track(&mut self, id: &TrackId) -> Option<Track> {
        let position = self.positions.remove(id)?;
        let removed = Arc::make_mut(&mut self.tracks).remove(position);
        self.locations.remove(&removed.location);
        self.reindex_positions();
        self.rebuild_groupings();
        Some(removed)
    }

    /// Recomputes albums and artists from the canonical track set.
    pub fn rebuild_groupings(&mut self) {
        let mut albums = group_albums(&self.tracks);
        albums.sort_by(|a, b| a.title.cmp(&b.title));

        let mut artists = group_artists(albums.clone());
        artists.sort_by(|a, b| a.name.cmp(&b.name));

        let live: HashSet<&str> = artists.iter().map(|artist| artist.name.as_str()).collect();
        self.artist_images
            .retain(|name, _| live.contains(name.as_str()));

        for artist in &mut artists {
            artist.image = self.artist_image(artist);
        }

        debug!(
            "Rebuilt groupings: {} tracks, {} albums, {} artists",
            self.tracks.len(),
            albums.len(),
            artists.len()
        );
        self.albums = Arc::new(albums);
        self.artists = Arc::new(artists);
    }

    pub fn tracks(&self) -> Arc<Vec<Track>> {
        Arc::clone(&self.tracks)
    }

    pub fn albums(&self) -> Arc<Vec<Album>> {
        Arc::clone(&self.albums)
    }

    pub fn artists(&self) -> Arc<Vec<Artist>> {
        Arc::clone(&self.artists)
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.positions
            .get(id)
            .and_then(|position| self.tracks.get(*position))
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn contains_location(&self, path: &Path) -> bool {
        self.locations.contains(path)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn search(&self, query: &str) -> Vec<Track> {
        query::search(&self.tracks, query)
    }

    fn reindex_positions(&mut self) {
        self.positions = self
            .tracks
            .iter()
            .enumerate()
            .map(|(position, track)| (track.id.clone(), position))
            .collect();
    }

    fn artist_image(&mut self, artist: &Artist) -> Option<Artwork> {
        if !self.options.resolve_artist_images {
            return None;
        }
        if let Some(cached) = self.artist_images.get(&artist.name) {
            return cached.clone();
        }
        let image = artist.first_track().and_then(|track| {
            find_artist_image(&track.location, &artist.name, self.options.artist_image_depth)
                .and_then(|path| load_artwork(&path))
        });
        self.artist_images.insert(artist.name.clone(), image.clone());
        image
    }
}

/// Buckets tracks by `(artist, album)` in first-seen order.
fn group_albums(tracks: &[Track]) -> Vec<Album> {
    let mut albums: Vec<Album> = Vec::new();
    let mut slots: HashMap<(&str, &str), usize> = HashMap::new();
    for track in tracks {
        let key = (track.artist.as_str(), track.album.as_str());
        let slot = *slots.entry(key).or_insert_with(|| {
            albums.push(Album {
                artist: track.artist.clone(),
                title: track.album.clone(),
                tracks: Vec::new(),
                artwork: None,
                year: None,
                duration: 0.0,
            });
            albums.len() - 1
        });
        let album = &mut albums[slot];
        if album.artwork.is_none() && album.tracks.is_empty() {
            album.artwork = track.artwork.clone();
        }
        if album.year.is_none() {
            album.year = track.year;
        }
        album.duration += track.duration;
        album.tracks.push(track.clone());
    }
    albums
}

/// Buckets title-sorted albums by artist name in first-seen order.
fn group_artists(albums: Vec<Album>) -> Vec<Artist> {
    let mut artists: Vec<Artist> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for album in albums {
        let slot = match slots.get(&album.artist) {
            Some(slot) => *slot,
            None => {
                artists.push(Artist {
                    name: album.artist.clone(),
                    albums: Vec::new(),
                    image: None,
                });
                slots.insert(album.artist.clone(), artists.len() - 1);
                artists.len() - 1
            }
        };
        artists[slot].albums.push(album);
    }
    artists
}
