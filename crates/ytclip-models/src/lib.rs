//! Shared data models for the ytclip clip downloader.
//!
//! This crate provides Serde-serializable types for:
//! - Clip requests and quality selection
//! - Jobs, job status and progress events
//! - Video metadata returned by the probe
//! - URL and time parsing helpers

pub mod clip;
pub mod event;
pub mod job;
pub mod quality;
pub mod timestamp;
pub mod utils;
pub mod video;

// Re-export common types
pub use clip::{ClipRequest, ClipRequestError};
pub use event::ProgressEvent;
pub use job::{JobId, JobOutcome, JobSnapshot, JobStatus};
pub use quality::Quality;
pub use timestamp::{
    checked_seconds_from_hms, format_section_range, format_section_time, parse_time_input,
    seconds_from_hms, TimestampError,
};
pub use utils::{extract_video_id, YoutubeIdError, YoutubeIdResult};
pub use video::{fallback_thumbnail_url, VideoMetadata};
