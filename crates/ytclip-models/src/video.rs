//! Video metadata returned by the metadata probe.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata for a source video. Every field is null when the probe fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Video title
    pub title: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Duration in seconds
    pub duration: Option<u64>,
}

impl VideoMetadata {
    /// All-null metadata.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Predictable CDN thumbnail for a video ID.
pub fn fallback_thumbnail_url(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id)
}
