use std::fs;
use std::path::{Path, PathBuf};

use common::Artwork;
use lofty::picture::{Picture, PictureType};
use tracing::debug;

/// How many directories above the track folder are searched for artwork.
pub const ARTWORK_SEARCH_DEPTH: usize = 5;

const COVER_STEMS: &[&str] = &["cover", "folder", "front", "album"];
const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Folder artwork for the track at `track_path`.
///
/// Walks the track's directory and up to `depth` ancestors looking for a
/// conventionally named cover, nearest first. Only when no level has one does
/// any image in the track's own directory qualify.
pub fn find_folder_artwork(track_path: &Path, depth: usize) -> Option<PathBuf> {
    let dir = track_path.parent()?;
    for current in dir.ancestors().take(depth + 1) {
        if let Some(named) = pick_named_cover(&image_files_in(current)) {
            return Some(named);
        }
    }
    image_files_in(dir).into_iter().next()
}

/// Image named after `artist` near the track, e.g. `Radiohead/Radiohead.jpg`.
pub fn find_artist_image(track_path: &Path, artist: &str, depth: usize) -> Option<PathBuf> {
    let wanted = artist.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    let dir = track_path.parent()?;
    for current in dir.ancestors().take(depth + 1) {
        let found = image_files_in(current).into_iter().find(|path| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_lowercase() == wanted)
                .unwrap_or(false)
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn load_artwork(path: &Path) -> Option<Artwork> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            debug!("Failed to read artwork {:?}: {}", path, err);
            return None;
        }
    };
    if data.is_empty() {
        return None;
    }
    let mime = guess_mime(&data).or_else(|| {
        mime_guess::from_path(path)
            .first_raw()
            .map(|value| value.to_string())
    });
    Some(Artwork::new(data, mime))
}

pub fn is_image_file(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map(|value| value.type_().as_str() == "image")
        .unwrap_or(false)
}

pub(crate) fn embedded_artwork(pictures: &[Picture]) -> Option<Artwork> {
    let picture = pick_picture(pictures)?;
    let data = picture.data().to_vec();
    if data.is_empty() {
        return None;
    }
    let mime = guess_mime(&data);
    Some(Artwork::new(data, mime))
}

fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    for picture in pictures {
        if picture.pic_type() == PictureType::CoverFront {
            return Some(picture);
        }
    }
    pictures.first()
}

fn pick_named_cover(images: &[PathBuf]) -> Option<PathBuf> {
    for stem in COVER_STEMS {
        for ext in COVER_EXTENSIONS {
            let wanted = format!("{}.{}", stem, ext);
            let found = images.iter().find(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().to_ascii_lowercase() == wanted)
                    .unwrap_or(false)
            });
            if let Some(path) = found {
                return Some(path.clone());
            }
        }
    }
    None
}

fn image_files_in(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    images.sort();
    images
}

fn guess_mime(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg".to_string())
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png".to_string())
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif".to_string())
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp".to_string())
    } else {
        None
    }
}
