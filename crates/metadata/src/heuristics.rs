use std::path::Path;

const DISC_PREFIXES: &[&str] = &["cd ", "disc ", "disk "];

/// Artist from a `"<artist> - <rest>"` file name, split on the first hyphen.
/// A leading `"<digits>. "` track number is stripped from the artist part.
pub fn artist_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let (head, rest) = stem.split_once('-')?;
    let head = head.trim();
    if head.is_empty() || rest.trim().is_empty() {
        return None;
    }

    let artist = strip_track_number(head).trim();
    if artist.is_empty() || artist.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(artist.to_string())
}

pub fn strip_track_number(text: &str) -> &str {
    let digits = text.len() - text.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return text;
    }
    match text[digits..].strip_prefix(". ") {
        Some(rest) => rest.trim_start(),
        None => text,
    }
}

/// Album from the directory layout: parent folder, or the grandparent when the
/// parent is a disc sub-folder such as `CD 1`.
pub fn album_from_path(path: &Path) -> Option<String> {
    let parent = path.parent()?;
    let parent_name = dir_name(parent)?;
    if is_disc_folder_name(&parent_name) {
        if let Some(grandparent) = parent.parent().and_then(dir_name) {
            return Some(grandparent);
        }
    }
    Some(parent_name)
}

pub fn is_disc_folder_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    DISC_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Disc number of a file sitting in a disc sub-folder (`CD 2` -> 2).
pub fn disc_from_path(path: &Path) -> Option<u16> {
    let name = dir_name(path.parent()?)?;
    parse_disc_number(&name)
}

fn parse_disc_number(name: &str) -> Option<u16> {
    let lower = name.to_lowercase();
    let rest = DISC_PREFIXES
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))?
        .trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|num| *num > 0)
}

fn dir_name(dir: &Path) -> Option<String> {
    let name = dir.file_name()?.to_string_lossy().trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn artist_from_filename_strips_track_number() {
        let path = Path::new("/Music/01. Richard Clayderman - Ballade Pour Adeline.mp3");
        assert_eq!(
            artist_from_filename(path).as_deref(),
            Some("Richard Clayderman")
        );
    }

    #[test]
    fn artist_from_filename_plain_pattern() {
        let path = Path::new("/Music/Portishead - Roads.flac");
        assert_eq!(artist_from_filename(path).as_deref(), Some("Portishead"));
    }

    #[test]
    fn artist_from_filename_splits_on_first_hyphen() {
        let path = Path::new("/Music/A - B - C.mp3");
        assert_eq!(artist_from_filename(path).as_deref(), Some("A"));
    }

    #[test]
    fn artist_from_filename_requires_both_halves() {
        assert_eq!(artist_from_filename(Path::new("/Music/Airbag.mp3")), None);
        assert_eq!(artist_from_filename(Path::new("/Music/ - Airbag.mp3")), None);
        assert_eq!(artist_from_filename(Path::new("/Music/Airbag - .mp3")), None);
        assert_eq!(artist_from_filename(Path::new("/Music/01 - Airbag.mp3")), None);
    }

    #[test]
    fn strip_track_number_needs_dot_space() {
        assert_eq!(strip_track_number("01. Artist"), "Artist");
        assert_eq!(strip_track_number("1.Artist"), "1.Artist");
        assert_eq!(strip_track_number("808 State"), "808 State");
        assert_eq!(strip_track_number("Artist"), "Artist");
    }

    #[test]
    fn album_from_path_skips_disc_folder() {
        let path = Path::new("/Music/Radiohead/OK Computer/CD 1/01. Airbag.flac");
        assert_eq!(album_from_path(path).as_deref(), Some("OK Computer"));
    }

    #[test]
    fn album_from_path_uses_parent() {
        let path = Path::new("/Music/Radiohead/Kid A/01. Everything.flac");
        assert_eq!(album_from_path(path).as_deref(), Some("Kid A"));
    }

    #[test]
    fn album_from_path_without_parent_name() {
        assert_eq!(album_from_path(Path::new("/track.mp3")), None);
        assert_eq!(album_from_path(Path::new("CD 1/track.mp3")).as_deref(), Some("CD 1"));
    }

    #[test]
    fn disc_number_from_folder() {
        assert_eq!(disc_from_path(Path::new("/M/Album/CD 2/a.mp3")), Some(2));
        assert_eq!(disc_from_path(Path::new("/M/Album/Disc 3/a.mp3")), Some(3));
        assert_eq!(disc_from_path(Path::new("/M/Album/a.mp3")), None);
        assert_eq!(disc_from_path(Path::new("/M/Album/CD Bonus/a.mp3")), None);
    }
}
