//! Deterministic, filesystem-safe artwork filenames.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::debug;

/// Upper bound for a single path component on common filesystems.
pub const MAX_FILENAME_LEN: usize = 255;

const EXTENSION: &str = ".jpg";
const ELLIPSIS: &str = "...";

static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

fn clean_text(text: &str) -> String {
    let stripped: String = INVALID_CHARS
        .replace_all(text, "")
        .chars()
        .filter(|c| c.is_whitespace() || !c.is_control())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_bytes`, never splitting a UTF-8 sequence.
fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Build `{prefix}_{title}_{artist}.jpg`.
///
/// Invalid and control characters are removed and whitespace collapsed. When the result
/// would exceed [`MAX_FILENAME_LEN`] bytes the title is shortened and ends in
/// `...`; the prefix and artist are preserved.
pub fn sanitize_filename(prefix: &str, title: &str, artist: &str) -> String {
    let clean_prefix = clean_text(prefix);
    let mut clean_title = clean_text(title);
    let mut clean_artist = clean_text(artist);

    // Two underscores plus the extension.
    let fixed = clean_prefix.len() + EXTENSION.len() + 2;

    // A pathological artist string would leave no room for anything else.
    let artist_budget = MAX_FILENAME_LEN.saturating_sub(fixed + ELLIPSIS.len());
    if clean_artist.len() > artist_budget {
        clean_artist = truncate_bytes(&clean_artist, artist_budget).to_string();
    }

    let max_title = MAX_FILENAME_LEN.saturating_sub(fixed + clean_artist.len());
    if clean_title.len() > max_title {
        let keep = max_title.saturating_sub(ELLIPSIS.len());
        clean_title = format!("{}{}", truncate_bytes(&clean_title, keep), ELLIPSIS);
    }

    let filename = format!("{clean_prefix}_{clean_title}_{clean_artist}{EXTENSION}");
    debug!(filename = %filename, len = filename.len(), "sanitized filename");
    filename
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_invalid_characters() {
        let name = sanitize_filename("AIC_1", "What? <Now>: \"Yes\"", "A/B\\C|D*");
        assert_eq!(name, "AIC_1_What Now Yes_ABCD.jpg");
    }

    #[test]
    fn test_collapses_whitespace_and_newlines() {
        let name = sanitize_filename("MET_9", "  The   Harvesters ", "Pieter Bruegel\nthe Elder");
        assert_eq!(name, "MET_9_The Harvesters_Pieter Bruegel the Elder.jpg");
    }

    #[test]
    fn test_removes_control_characters() {
        let name = sanitize_filename("AIC_2", "Untitled\u{0}", "Anon\u{7}ymous\u{1b}");
        assert_eq!(name, "AIC_2_Untitled_Anonymous.jpg");
        assert!(!name.chars().any(char::is_control));

        let name = sanitize_filename("AIC_3", "Tab\tand\u{85}next", "A");
        assert_eq!(name, "AIC_3_Tab and next_A.jpg");
    }

    #[test]
    fn test_long_title_is_truncated_with_ellipsis() {
        let title = "x".repeat(400);
        let name = sanitize_filename("CMA_123", &title, "Artist");
        assert_eq!(name.len(), MAX_FILENAME_LEN);
        assert!(name.starts_with("CMA_123_"));
        assert!(name.ends_with("..._Artist.jpg"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let title = "é".repeat(300);
        let name = sanitize_filename("AIC_5", &title, "Monet");
        assert!(name.len() <= MAX_FILENAME_LEN);
        assert!(name.ends_with("..._Monet.jpg"));
    }

    #[test]
    fn test_is_deterministic() {
        let a = sanitize_filename("AIC_1", "Water Lilies", "Claude Monet");
        let b = sanitize_filename("AIC_1", "Water Lilies", "Claude Monet");
        assert_eq!(a, b);
    }
}
