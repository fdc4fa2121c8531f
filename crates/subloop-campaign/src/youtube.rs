//! YouTube URL and ISO 8601 duration parsing.

use std::sync::OnceLock;

use regex::Regex;

/// Length of a YouTube video id.
pub const VIDEO_ID_LEN: usize = 11;

const VIDEO_ID_PATTERN: &str = concat!(
    r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|v/|e/|shorts/)|youtu\.be/|[?&]v=)",
    r"([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
);

const DURATION_PATTERN: &str = r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$";

fn video_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VIDEO_ID_PATTERN).ok()).as_ref()
}

fn duration_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DURATION_PATTERN).ok()).as_ref()
}

/// Extract the 11-character video id from a YouTube URL.
///
/// Accepts `watch?v=`, `embed/`, `v/`, `e/`, `shorts/`, `youtu.be/` and any
/// `&v=` query parameter.
pub fn extract_video_id(url: &str) -> Option<String> {
    let caps = video_id_regex()?.captures(url.trim())?;
    caps.get(1).map(|m| m.as_str().to_string())
}

/// Whether `id` is shaped like a YouTube video id.
pub fn is_video_id(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Parse a `PT#H#M#S` duration into seconds. Returns 0 if unparseable.
pub fn parse_iso8601_duration(duration: &str) -> u32 {
    let Some(caps) = duration_regex().and_then(|re| re.captures(duration.trim())) else {
        return 0;
    };
    let part = |idx: usize| -> u64 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let total = part(1)
        .saturating_mul(3600)
        .saturating_add(part(2).saturating_mul(60))
        .saturating_add(part(3));
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Default high-quality thumbnail for a video id.
pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg")
}
