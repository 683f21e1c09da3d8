//! Clip request definition and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quality::Quality;
use crate::timestamp::format_section_range;
use crate::utils::{extract_video_id, YoutubeIdError};

/// Reasons a clip request is rejected before any work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipRequestError {
    #[error("{0}")]
    InvalidUrl(#[from] YoutubeIdError),

    #[error("End time must be after start")]
    InvalidRange { start_secs: u64, end_secs: u64 },
}

/// A validated request to extract a time range from a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRequest {
    /// URL as entered (trimmed)
    pub url: String,
    /// 11-character video identifier extracted from the URL
    pub video_id: String,
    /// Requested quality
    pub quality: Quality,
    /// Clip start in seconds
    pub start_secs: u64,
    /// Clip end in seconds (always greater than `start_secs`)
    pub end_secs: u64,
}

impl ClipRequest {
    /// Validate user input and build a request.
    ///
    /// Fails with [`ClipRequestError::InvalidUrl`] if no accepted URL shape
    /// matches, or [`ClipRequestError::InvalidRange`] if `end <= start`.
    pub fn new(
        url: &str,
        quality: Quality,
        start_secs: u64,
        end_secs: u64,
    ) -> Result<Self, ClipRequestError> {
        let video_id = extract_video_id(url)?;

        if end_secs <= start_secs {
            return Err(ClipRequestError::InvalidRange {
                start_secs,
                end_secs,
            });
        }

        Ok(Self {
            url: url.trim().to_string(),
            video_id,
            quality,
            start_secs,
            end_secs,
        })
    }

    /// Length of the requested clip in seconds.
    pub fn duration_secs(&self) -> u64 {
        self.end_secs - self.start_secs
    }

    /// yt-dlp `--download-sections` argument.
    pub fn section_arg(&self) -> String {
        format_section_range(self.start_secs, self.end_secs)
    }

    /// Deterministic output file name for this video and range.
    pub fn output_file_name(&self) -> String {
        format!(
            "clip_{}_{}-{}.mp4",
            self.video_id, self.start_secs, self.end_secs
        )
    }
}
