use regex::Regex;
use std::sync::LazyLock;

static TRACK_URI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^spotify:track:([a-zA-Z0-9]+)$").expect("Invalid track URI regex")
});

// Share links often carry a ?si= suffix, which the capture stops before.
static TRACK_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"open\.spotify\.com/(?:intl-[a-z]+/)?track/([a-zA-Z0-9]+)")
        .expect("Invalid Spotify link regex")
});

pub fn parse_track_id(reference: &str) -> Option<String> {
    let reference = reference.trim();
    TRACK_URI_REGEX
        .captures(reference)
        .or_else(|| TRACK_LINK_REGEX.captures(reference))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Turns a track URI or share link into the `spotify:track:<id>` form the
/// queue endpoint expects. Anything else is passed through untouched.
pub fn normalize_track_uri(reference: &str) -> String {
    match parse_track_id(reference) {
        Some(id) => format!("spotify:track:{}", id),
        None => reference.trim().to_string(),
    }
}
