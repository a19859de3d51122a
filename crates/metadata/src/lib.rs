mod artwork;
mod heuristics;
mod keys;

use std::path::{Path, PathBuf};

use common::{absolute_path, clamp_duration, Artwork, Track, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use lofty::error::LoftyError;
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};
use lofty::tag::Tag;
use tracing::debug;

pub use artwork::{
    find_artist_image, find_folder_artwork, is_image_file, load_artwork, ARTWORK_SEARCH_DEPTH,
};
pub use heuristics::{
    album_from_path, artist_from_filename, disc_from_path, is_disc_folder_name,
    strip_track_number,
};
pub use keys::{match_key, KeyRule, TagField, EXCLUDED_NEEDLES, KEY_RULES};

#[derive(Debug, Default, Clone)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub track_no: Option<u16>,
    pub disc_no: Option<u16>,
    pub duration_secs: Option<f64>,
    pub artwork: Option<Artwork>,
}

impl TagInfo {
    /// Sets `field` from `value` unless the field already holds a value.
    pub fn fill(&mut self, field: TagField, value: &str) -> bool {
        match field {
            TagField::Title => fill_text(&mut self.title, value),
            TagField::Artist => fill_text(&mut self.artist, value),
            TagField::Album => fill_text(&mut self.album, value),
            TagField::Genre => fill_text(&mut self.genre, value),
            TagField::Year => {
                if self.year.is_some() {
                    return false;
                }
                self.year = parse_year(value);
                self.year.is_some()
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub artwork_search_depth: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            artwork_search_depth: ARTWORK_SEARCH_DEPTH,
        }
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    FileNotFound(PathBuf),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::FileNotFound(path) => write!(f, "file not found: {}", path.display()),
        }
    }
}

impl std::error::Error for ExtractError {}

pub fn extract(path: &Path) -> Result<Track, ExtractError> {
    extract_with(path, &ExtractOptions::default())
}

/// Builds a [`Track`] for the audio file at `path`.
///
/// Only a missing file is an error. Every metadata field degrades through its
/// fallback chain: embedded tags, fuzzy tag keys, file name, directory layout,
/// and finally the placeholders.
pub fn extract_with(path: &Path, options: &ExtractOptions) -> Result<Track, ExtractError> {
    let path = &absolute_path(path);
    if !path.is_file() {
        return Err(ExtractError::FileNotFound(path.to_path_buf()));
    }

    let tags = match read_tags(path) {
        Ok(tags) => tags,
        Err(err) => {
            debug!("Failed to read tags for {:?}: {}", path, err);
            TagInfo::default()
        }
    };

    let mut track = Track::placeholder(path);
    if let Some(title) = tags.title {
        track.title = title;
    }
    track.artist = tags
        .artist
        .or_else(|| artist_from_filename(path))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    track.album = tags
        .album
        .or_else(|| album_from_path(path))
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
    track.artwork = tags.artwork.or_else(|| {
        find_folder_artwork(path, options.artwork_search_depth)
            .and_then(|cover| load_artwork(&cover))
    });
    track.duration = clamp_duration(tags.duration_secs.unwrap_or(0.0));
    track.year = tags.year;
    track.genre = tags.genre;
    track.track_no = tags.track_no;
    track.disc_no = tags.disc_no.or_else(|| disc_from_path(path));

    Ok(track)
}

/// Reads the standard tag vocabulary from the primary tag, then fills the
/// remaining gaps from every tag item whose key fuzzily matches a field.
pub fn read_tags(path: &Path) -> Result<TagInfo, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;
    let properties = tagged_file.properties();

    let mut info = TagInfo {
        duration_secs: Some(properties.duration().as_secs_f64()),
        ..TagInfo::default()
    };

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        read_standard_fields(tag, &mut info);
    }
    for tag in tagged_file.tags() {
        read_fuzzy_fields(tag, &mut info);
    }

    Ok(info)
}

fn read_standard_fields(tag: &Tag, info: &mut TagInfo) {
    info.title = clean_text(tag.get_string(&ItemKey::TrackTitle));
    info.album = clean_text(tag.get_string(&ItemKey::AlbumTitle));
    info.artist = clean_text(tag.get_string(&ItemKey::TrackArtist))
        .or_else(|| clean_text(tag.get_string(&ItemKey::AlbumArtist)));
    info.track_no = tag.get_string(&ItemKey::TrackNumber).and_then(parse_u16);
    info.disc_no = tag.get_string(&ItemKey::DiscNumber).and_then(parse_u16);
    info.year = tag
        .get_string(&ItemKey::Year)
        .or_else(|| tag.get_string(&ItemKey::RecordingDate))
        .and_then(parse_year);
    info.genre = clean_text(tag.get_string(&ItemKey::Genre));
    info.artwork = artwork::embedded_artwork(tag.pictures());
}

fn read_fuzzy_fields(tag: &Tag, info: &mut TagInfo) {
    let tag_type = tag.tag_type();
    for item in tag.items() {
        let value = match item.value().text() {
            Some(value) => value,
            None => continue,
        };
        let key = match item.key() {
            ItemKey::Unknown(raw) => raw.as_str(),
            known => match known.map_key(tag_type, false) {
                Some(name) => name,
                None => continue,
            },
        };
        if let Some(field) = match_key(key) {
            if info.fill(field, value) {
                debug!("Filled {:?} from tag key {:?}", field, key);
            }
        }
    }
}

fn fill_text(slot: &mut Option<String>, value: &str) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = clean_text(Some(value));
    slot.is_some()
}

/// Trimmed value, or `None` for empty strings and placeholder values.
fn clean_text(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || is_placeholder(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_placeholder(value: &str) -> bool {
    value.eq_ignore_ascii_case("unknown")
        || value.eq_ignore_ascii_case(UNKNOWN_ARTIST)
        || value.eq_ignore_ascii_case(UNKNOWN_ALBUM)
}

fn parse_u16(text: &str) -> Option<u16> {
    let head = text.split('/').next().unwrap_or(text).trim();
    head.parse().ok()
}

fn parse_year(text: &str) -> Option<i32> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            if digits.len() == 4 {
                break;
            }
        } else if !digits.is_empty() {
            break;
        }
    }
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use lofty::config::WriteOptions;
    use lofty::picture::{MimeType, Picture, PictureType};
    use lofty::prelude::{Accessor, TagExt};
    use lofty::tag::{ItemValue, TagItem, TagType};
    use tempfile::tempdir;

    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// Mono 16-bit PCM at 8 kHz, all silence.
    fn silent_wav(seconds: u32) -> Vec<u8> {
        let sample_rate: u32 = 8_000;
        let data_len = sample_rate * 2 * seconds;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(bytes.len() + data_len as usize, 0);
        bytes
    }

    /// A lone STREAMINFO block: 44.1 kHz mono 16-bit, no frames.
    fn silent_flac(seconds: u64) -> Vec<u8> {
        let sample_rate: u64 = 44_100;
        let mut bytes = b"fLaC".to_vec();
        bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        let packed = (sample_rate << 44) | (15 << 36) | (sample_rate * seconds);
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0; 16]);
        bytes
    }

    fn text_item(key: ItemKey, value: &str) -> TagItem {
        TagItem::new(key, ItemValue::Text(value.to_string()))
    }

    #[test]
    fn missing_file_is_hard_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.mp3");
        assert_eq!(extract(&path), Err(ExtractError::FileNotFound(path.clone())));
    }

    #[test]
    fn untagged_file_uses_placeholders() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Some Song.mp3");
        fs::write(&path, b"not a real mp3").unwrap();

        let track = extract(&path).unwrap();
        assert_eq!(track.title, "Some Song");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert_eq!(track.duration, 0.0);
        assert_eq!(track.id, common::identify(&path));
        assert!(track.artwork.is_none());
    }

    #[test]
    fn untagged_file_infers_artist_from_filename() {
        let dir = tempdir().unwrap();
        let path = dir
            .path()
            .join("01. Richard Clayderman - Ballade Pour Adeline.mp3");
        fs::write(&path, b"not a real mp3").unwrap();

        let track = extract(&path).unwrap();
        assert_eq!(track.artist, "Richard Clayderman");
        assert_eq!(track.title, "01. Richard Clayderman - Ballade Pour Adeline");
    }

    #[test]
    fn untagged_file_infers_album_past_disc_folder() {
        let dir = tempdir().unwrap();
        let disc = dir.path().join("Radiohead").join("OK Computer").join("CD 1");
        fs::create_dir_all(&disc).unwrap();
        let path = disc.join("01. Airbag.flac");
        fs::write(&path, b"not a real flac").unwrap();

        let track = extract(&path).unwrap();
        assert_eq!(track.album, "OK Computer");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert_eq!(track.disc_no, Some(1));
    }

    #[test]
    fn folder_artwork_fills_missing_embedded_art() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Album");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("cover.png"), PNG).unwrap();
        let path = album.join("track.mp3");
        fs::write(&path, b"not a real mp3").unwrap();

        let track = extract(&path).unwrap();
        let artwork = track.artwork.expect("folder artwork");
        assert_eq!(&artwork.data[..], PNG);
        assert_eq!(artwork.mime.as_deref(), Some("image/png"));
    }

    #[test]
    fn reads_standard_tags_picture_and_duration() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Folder Album");
        fs::create_dir_all(&album).unwrap();
        let path = album.join("Folder Artist - track.wav");
        fs::write(&path, silent_wav(2)).unwrap();

        let mut tag = Tag::new(TagType::Id3v2);
        tag.set_title("Roads".to_string());
        tag.set_artist("Portishead".to_string());
        tag.set_album("Dummy".to_string());
        tag.set_genre("Trip Hop".to_string());
        tag.set_track(3);
        tag.insert_unchecked(text_item(ItemKey::RecordingDate, "1994-08-22"));
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(MimeType::Png),
            None,
            PNG.to_vec(),
        ));
        tag.save_to_path(&path, WriteOptions::default()).unwrap();

        let track = extract(&path).unwrap();
        assert_eq!(track.title, "Roads");
        assert_eq!(track.artist, "Portishead");
        assert_eq!(track.album, "Dummy");
        assert_eq!(track.genre.as_deref(), Some("Trip Hop"));
        assert_eq!(track.track_no, Some(3));
        assert_eq!(track.year, Some(1994));
        assert!((track.duration - 2.0).abs() < 0.05, "duration {}", track.duration);

        let artwork = track.artwork.expect("embedded artwork");
        assert_eq!(&artwork.data[..], PNG);
        assert_eq!(artwork.mime.as_deref(), Some("image/png"));
    }

    #[test]
    fn fuzzy_key_fills_artist_from_file() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Dummy");
        fs::create_dir_all(&album).unwrap();
        let path = album.join("01.flac");
        fs::write(&path, silent_flac(3)).unwrap();

        let mut tag = Tag::new(TagType::VorbisComments);
        tag.set_title("Sour Times".to_string());
        tag.insert_unchecked(text_item(ItemKey::Unknown("KUENSTLER".to_string()), "Portishead"));
        tag.insert_unchecked(text_item(
            ItemKey::Unknown("MUSICBRAINZ_ALBUMID".to_string()),
            "8f3a1c2e-0000-4000-8000-000000000000",
        ));
        tag.save_to_path(&path, WriteOptions::default()).unwrap();

        let info = read_tags(&path).unwrap();
        assert_eq!(info.title.as_deref(), Some("Sour Times"));
        assert_eq!(info.artist.as_deref(), Some("Portishead"));
        assert_eq!(info.album, None);

        let track = extract(&path).unwrap();
        assert_eq!(track.artist, "Portishead");
        assert_eq!(track.album, "Dummy");
        assert!((track.duration - 3.0).abs() < 0.05, "duration {}", track.duration);
    }

    #[test]
    fn fuzzy_fields_cover_unknown_and_mapped_keys() {
        let mut tag = Tag::new(TagType::VorbisComments);
        tag.insert_unchecked(text_item(ItemKey::Unknown("Künstler".to_string()), "Kraftwerk"));
        tag.insert_unchecked(text_item(ItemKey::AlbumTitle, "Autobahn"));
        tag.insert_unchecked(text_item(ItemKey::MusicBrainzReleaseId, "not-a-title"));
        tag.insert_unchecked(text_item(ItemKey::Unknown("DISCSUBTITLE".to_string()), "Side A"));

        let mut info = TagInfo::default();
        read_fuzzy_fields(&tag, &mut info);
        assert_eq!(info.artist.as_deref(), Some("Kraftwerk"));
        assert_eq!(info.album.as_deref(), Some("Autobahn"));
        assert_eq!(info.title, None);
    }

    #[test]
    fn fill_only_sets_missing_fields() {
        let mut info = TagInfo {
            title: Some("Tagged".to_string()),
            ..TagInfo::default()
        };
        assert!(!info.fill(TagField::Title, "Other"));
        assert!(info.fill(TagField::Artist, " Someone "));
        assert!(!info.fill(TagField::Album, "Unknown Album"));
        assert!(info.fill(TagField::Year, "2001-05-04"));
        assert_eq!(info.title.as_deref(), Some("Tagged"));
        assert_eq!(info.artist.as_deref(), Some("Someone"));
        assert_eq!(info.album, None);
        assert_eq!(info.year, Some(2001));
    }

    #[test]
    fn parses_numbers_and_years() {
        assert_eq!(parse_u16("3/12"), Some(3));
        assert_eq!(parse_u16("x"), None);
        assert_eq!(parse_year("1997"), Some(1997));
        assert_eq!(parse_year("Released 1997-06-16"), Some(1997));
        assert_eq!(parse_year("97"), None);
    }
}
