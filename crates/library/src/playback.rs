use std::path::Path;

use common::TrackId;
use tracing::{debug, warn};

use crate::index::LibraryIndex;

/// The audio output the engine drives. Decoding and output live behind it.
pub trait Transport {
    type Error: std::fmt::Display;

    fn load(&mut self, location: &Path) -> Result<(), Self::Error>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    /// Seconds into the loaded track.
    fn position(&self) -> f64;
    fn is_playing(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayQueue {
    tracks: Vec<TrackId>,
    current: Option<usize>,
}

impl PlayQueue {
    pub fn new(tracks: Vec<TrackId>) -> Self {
        Self {
            tracks,
            current: None,
        }
    }

    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&TrackId> {
        self.current.and_then(|index| self.tracks.get(index))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Index after `from` under `repeat`, or `None` at the end of the queue.
    fn following(&self, from: usize, repeat: RepeatMode) -> Option<usize> {
        let next = from + 1;
        if next < self.tracks.len() {
            Some(next)
        } else if repeat == RepeatMode::All && !self.tracks.is_empty() {
            Some(0)
        } else {
            None
        }
    }

    fn preceding(&self, from: usize, repeat: RepeatMode) -> Option<usize> {
        if from > 0 {
            Some(from - 1)
        } else if repeat == RepeatMode::All && !self.tracks.is_empty() {
            Some(self.tracks.len() - 1)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackStatus {
    pub track_id: Option<TrackId>,
    pub position: f64,
    pub playing: bool,
}

/// Queue navigation on top of a [`Transport`]. Ids that no longer resolve in
/// the index, or whose file fails to load, are skipped.
pub struct PlaybackSession<T: Transport> {
    transport: T,
    queue: PlayQueue,
    repeat: RepeatMode,
}

impl<T: Transport> PlaybackSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            queue: PlayQueue::default(),
            repeat: RepeatMode::Off,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    /// Replaces the queue and starts playing at `start`, or the first
    /// playable track after it.
    pub fn start(&mut self, index: &LibraryIndex, tracks: Vec<TrackId>, start: usize) -> bool {
        self.transport.stop();
        self.queue = PlayQueue::new(tracks);
        if start >= self.queue.len() {
            return false;
        }
        self.play_from(index, start, Direction::Forward)
    }

    pub fn next(&mut self, index: &LibraryIndex) -> bool {
        let candidate = match self.queue.current {
            Some(current) => self.queue.following(current, self.repeat),
            None if !self.queue.is_empty() => Some(0),
            None => None,
        };
        match candidate {
            Some(candidate) => self.play_from(index, candidate, Direction::Forward),
            None => self.finish(),
        }
    }

    pub fn previous(&mut self, index: &LibraryIndex) -> bool {
        let current = match self.queue.current {
            Some(current) => current,
            None => return false,
        };
        match self.queue.preceding(current, self.repeat) {
            Some(candidate) => self.play_from(index, candidate, Direction::Backward),
            None => self.play_from(index, current, Direction::Forward),
        }
    }

    /// Called when the transport reaches the end of the current track.
    pub fn track_finished(&mut self, index: &LibraryIndex) -> bool {
        if self.repeat == RepeatMode::One {
            if let Some(current) = self.queue.current {
                return self.play_from(index, current, Direction::Forward);
            }
        }
        self.next(index)
    }

    pub fn pause(&mut self) {
        self.transport.pause();
    }

    pub fn resume(&mut self) {
        if self.queue.current.is_some() {
            self.transport.play();
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            track_id: self.queue.current().cloned(),
            position: self.transport.position(),
            playing: self.transport.is_playing(),
        }
    }

    /// Plays the first track at or past `from` in `direction` that resolves
    /// and loads. Each slot is tried at most once.
    fn play_from(&mut self, index: &LibraryIndex, from: usize, direction: Direction) -> bool {
        let mut candidate = Some(from);
        for _ in 0..self.queue.len() {
            let position = match candidate {
                Some(position) => position,
                None => break,
            };
            if self.try_load(index, position) {
                self.queue.current = Some(position);
                self.transport.play();
                return true;
            }
            let repeat = match self.repeat {
                RepeatMode::One => RepeatMode::Off,
                other => other,
            };
            candidate = match direction {
                Direction::Forward => self.queue.following(position, repeat),
                Direction::Backward => self.queue.preceding(position, repeat),
            };
        }
        self.finish()
    }

    fn try_load(&mut self, index: &LibraryIndex, position: usize) -> bool {
        let track_id = match self.queue.tracks.get(position) {
            Some(track_id) => track_id,
            None => return false,
        };
        let track = match index.track(track_id) {
            Some(track) => track,
            None => {
                debug!("Skipping queued track {} no longer in the library", track_id);
                return false;
            }
        };
        match self.transport.load(&track.location) {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to load {:?}: {}", track.location, err);
                false
            }
        }
    }

    fn finish(&mut self) -> bool {
        self.transport.stop();
        self.queue.current = None;
        false
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}
