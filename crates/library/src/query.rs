use common::{Album, Artist, Track};

/// Tracks whose title, artist or album contains `query`, case-insensitively.
/// An empty or whitespace-only query returns every track. Order is preserved.
pub fn search(tracks: &[Track], query: &str) -> Vec<Track> {
    let needle = normalize(query);
    if needle.is_empty() {
        return tracks.to_vec();
    }
    tracks
        .iter()
        .filter(|track| matches_query(track, &needle))
        .cloned()
        .collect()
}

pub fn search_albums(albums: &[Album], query: &str) -> Vec<Album> {
    let needle = normalize(query);
    if needle.is_empty() {
        return albums.to_vec();
    }
    albums
        .iter()
        .filter(|album| contains(&album.title, &needle) || contains(&album.artist, &needle))
        .cloned()
        .collect()
}

pub fn search_artists(artists: &[Artist], query: &str) -> Vec<Artist> {
    let needle = normalize(query);
    if needle.is_empty() {
        return artists.to_vec();
    }
    artists
        .iter()
        .filter(|artist| contains(&artist.name, &needle))
        .cloned()
        .collect()
}

/// `needle` must already be lowercased.
pub fn matches_query(track: &Track, needle: &str) -> bool {
    contains(&track.title, needle) || contains(&track.artist, needle) || contains(&track.album, needle)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use common::Track;

    use super::*;

    fn track(path: &str, title: &str, artist: &str, album: &str) -> Track {
        let mut track = Track::placeholder(Path::new(path));
        track.title = title.to_string();
        track.artist = artist.to_string();
        track.album = album.to_string();
        track
    }

    fn sample() -> Vec<Track> {
        vec![
            track("/m/1.mp3", "Airbag", "Radiohead", "OK Computer"),
            track("/m/2.mp3", "Roads", "Portishead", "Dummy"),
            track("/m/3.mp3", "Karma Police", "Radiohead", "OK Computer"),
        ]
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let tracks = sample();
        assert_eq!(search(&tracks, ""), tracks);
        assert_eq!(search(&tracks, "   "), tracks);
    }

    #[test]
    fn matches_any_field_case_insensitively() {
        let tracks = sample();
        let titles = |query: &str| -> Vec<String> {
            search(&tracks, query)
                .into_iter()
                .map(|track| track.title)
                .collect()
        };
        assert_eq!(titles("RADIO"), vec!["Airbag", "Karma Police"]);
        assert_eq!(titles("dummy"), vec!["Roads"]);
        assert_eq!(titles("police"), vec!["Karma Police"]);
        assert!(titles("zeppelin").is_empty());
    }

    #[test]
    fn album_and_artist_search() {
        let album = Album {
            artist: "Radiohead".to_string(),
            title: "OK Computer".to_string(),
            tracks: Vec::new(),
            artwork: None,
            year: None,
            duration: 0.0,
        };
        let artist = Artist {
            name: "Radiohead".to_string(),
            albums: vec![album.clone()],
            image: None,
        };
        assert_eq!(search_albums(&[album.clone()], "computer").len(), 1);
        assert_eq!(search_albums(&[album], "kid a").len(), 0);
        assert_eq!(search_artists(&[artist.clone()], "HEAD").len(), 1);
        assert_eq!(search_artists(&[artist], "x").len(), 0);
    }
}
