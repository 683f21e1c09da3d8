//! Quality selection and the yt-dlp format table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested output quality.
///
/// Parsing never fails: anything unrecognized becomes [`Quality::Best`],
/// which maps to yt-dlp's generic `best` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Quality {
    /// 2160p (4K)
    P2160,
    /// 1080p
    P1080,
    /// 720p
    #[default]
    P720,
    /// 480p
    P480,
    /// 360p
    P360,
    /// Best mp4 video + m4a audio, any height
    BestAvailable,
    /// Whatever yt-dlp considers best
    Best,
}

impl Quality {
    /// Qualities offered to clients, in display order.
    pub const OFFERED: &'static [Quality] = &[
        Quality::P2160,
        Quality::P1080,
        Quality::P720,
        Quality::P480,
        Quality::P360,
        Quality::BestAvailable,
    ];

    /// Parse a user-supplied quality label.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "2160p" | "4k" => Quality::P2160,
            "1080p" => Quality::P1080,
            "720p" => Quality::P720,
            "480p" => Quality::P480,
            "360p" => Quality::P360,
            "best available" | "best_available" => Quality::BestAvailable,
            _ => Quality::Best,
        }
    }

    /// Label as shown to users and accepted by [`Quality::parse`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P2160 => "2160p",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::BestAvailable => "best available",
            Quality::Best => "best",
        }
    }

    /// Maximum video height, if the quality caps it.
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::P2160 => Some(2160),
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
            Quality::BestAvailable | Quality::Best => None,
        }
    }

    /// yt-dlp `-f` format selector.
    pub fn format_spec(&self) -> String {
        match (self, self.max_height()) {
            (_, Some(h)) => format!(
                "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}]"
            ),
            (Quality::BestAvailable, None) => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best".to_string(),
            _ => "best".to_string(),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Quality {
    fn from(label: &str) -> Self {
        Quality::parse(label)
    }
}

impl From<String> for Quality {
    fn from(label: String) -> Self {
        Quality::parse(&label)
    }
}

impl From<Quality> for String {
    fn from(quality: Quality) -> Self {
        quality.as_str().to_string()
    }
}
