//! Fuzzy matching of tag keys outside the standard vocabulary.
//!
//! Rules are evaluated top to bottom and the first rule whose needle occurs in
//! the lowercased key wins. Order matters: `ALBUMARTIST` must land on the
//! artist rule before the album rule sees it, and `ALBUM TITLE` must land on
//! the album rule before the title rule sees it.
//!
//! Keys containing an excluded needle never match, so identifiers and sort
//! names such as `MUSICBRAINZ_ALBUMID` or `ARTISTSORT` cannot fill a field.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagField {
    Artist,
    Album,
    Title,
    Year,
    Genre,
}

#[derive(Debug)]
pub struct KeyRule {
    pub field: TagField,
    pub needles: &'static [&'static str],
}

impl KeyRule {
    fn matches(&self, key: &str) -> bool {
        self.needles.iter().any(|needle| key.contains(needle))
    }
}

pub const EXCLUDED_NEEDLES: &[&str] = &["musicbrainz", "subtitle", "sort", "replaygain"];

pub const KEY_RULES: &[KeyRule] = &[
    KeyRule {
        field: TagField::Artist,
        needles: &[
            "artist",
            "author",
            "performer",
            "interpret",
            "künstler",
            "kuenstler",
            "artiste",
            "©art",
            "tpe1",
        ],
    },
    KeyRule {
        field: TagField::Album,
        needles: &["album", "©alb", "talb"],
    },
    KeyRule {
        field: TagField::Title,
        needles: &["title", "name", "titel", "titre", "©nam", "tit2"],
    },
    KeyRule {
        field: TagField::Year,
        needles: &["year", "date", "©day", "tyer", "tdrc"],
    },
    KeyRule {
        field: TagField::Genre,
        needles: &["genre", "©gen", "tcon"],
    },
];

pub fn match_key(key: &str) -> Option<TagField> {
    let key = key.trim().to_lowercase();
    if key.is_empty() || EXCLUDED_NEEDLES.iter().any(|needle| key.contains(needle)) {
        return None;
    }
    KEY_RULES
        .iter()
        .find(|rule| rule.matches(&key))
        .map(|rule| rule.field)
}
