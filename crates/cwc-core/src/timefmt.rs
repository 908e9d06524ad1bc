//! Time and cell formatting helpers shared by both output modes.

use chrono::{DateTime, Utc};

/// Render a creation timestamp as a relative age ("32s ago", "5 min ago").
/// Missing timestamps render as "-".
pub fn relative_created(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return "-".to_string();
    };
    let secs = now.signed_duration_since(created).num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{} min ago", secs / 60)
    } else if secs < 86_400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86_400)
    }
}

/// Clamp text to a fixed cell width, ellipsizing when it does not fit.
pub fn truncate(value: &str, width: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= width {
        return value.to_string();
    }
    if width <= 3 {
        return chars[..width].iter().collect();
    }
    let mut out: String = chars[..width - 3].iter().collect();
    out.push_str("...");
    out
}
