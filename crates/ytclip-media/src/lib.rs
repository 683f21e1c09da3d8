#![deny(unreachable_patterns)]
//! yt-dlp CLI wrapper for clip extraction.
//!
//! This crate provides:
//! - Type-safe yt-dlp command building
//! - Tool discovery on an augmented search path
//! - Progress scraping from yt-dlp and ffmpeg output
//! - Cancellation and timeout support via tokio
//! - Metadata-only probing

pub mod command;
pub mod download;
pub mod error;
pub mod probe;
pub mod progress;

pub use command::{check_tools, ToolEnv, YtDlpCommand};
pub use download::{ClipDownloader, DownloadOptions, YtDlpDownloader};
pub use error::{MediaError, MediaResult};
pub use probe::probe_metadata;
pub use progress::{parse_progress_line, ProgressSink};
