//! Text derivations used by the views: hashtags and relative timestamps.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

fn hashtag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"#([A-Za-z0-9_]+)").ok())
        .as_ref()
}

/// Hashtags in `text`, without the `#`, in order of first appearance.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let Some(re) = hashtag_pattern() else {
        return tags;
    };
    for caps in re.captures_iter(text) {
        let tag = &caps[1];
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Short age label such as `45s`, `3m`, `2h` or `5d`.
///
/// The largest unit that fits is used and the count is truncated. Missing
/// timestamps read as `just now`; timestamps ahead of `now` clamp to `0s`.
pub fn relative_time(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return "just now".to_string();
    };
    let secs = (now - timestamp).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s => format!("{}d", s / 86_400),
    }
}

/// `@handle`, without doubling a sigil the user already typed.
pub fn display_handle(handle: &str) -> String {
    format!("@{}", handle.trim_start_matches('@'))
}
