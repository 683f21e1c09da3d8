//! Utility functions for URL parsing and validation.

use std::sync::LazyLock;

use regex::Regex;

/// Errors that can occur during YouTube ID extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YoutubeIdError {
    /// Input was empty after trimming
    EmptyUrl,
    /// No accepted URL shape matched
    InvalidYoutubeUrl,
}

impl std::fmt::Display for YoutubeIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YoutubeIdError::EmptyUrl => write!(f, "Enter a YouTube URL"),
            YoutubeIdError::InvalidYoutubeUrl => write!(f, "Invalid YouTube URL"),
        }
    }
}

impl std::error::Error for YoutubeIdError {}

/// Result type for YouTube ID extraction.
pub type YoutubeIdResult<T> = Result<T, YoutubeIdError>;

/// Accepted URL shapes, in priority order: watch page, short link, embed.
static VIDEO_ID_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})").unwrap(),
        Regex::new(r"youtu\.be/([a-zA-Z0-9_-]{11})").unwrap(),
        Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})").unwrap(),
    ]
});

/// Extract the 11-character YouTube video ID from a pasted URL.
///
/// Supported shapes:
/// - https://www.youtube.com/watch?v=VIDEO_ID
/// - https://youtu.be/VIDEO_ID
/// - https://www.youtube.com/embed/VIDEO_ID
///
/// Patterns are searched anywhere in the trimmed input, so scheme,
/// subdomain and trailing query parameters are ignored.
pub fn extract_video_id(url: &str) -> YoutubeIdResult<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(YoutubeIdError::EmptyUrl);
    }

    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(YoutubeIdError::InvalidYoutubeUrl)
}
