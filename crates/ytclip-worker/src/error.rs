//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;
use ytclip_media::MediaError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Longest panic message carried into a job's error text.
pub const MAX_PANIC_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Output file not found after download")]
    ArtifactMissing(PathBuf),

    #[error("{0}")]
    Panicked(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Build from a panic payload, keeping at most
    /// [`MAX_PANIC_MESSAGE_CHARS`] characters.
    pub fn panicked(message: impl AsRef<str>) -> Self {
        Self::Panicked(message.as_ref().chars().take(MAX_PANIC_MESSAGE_CHARS).collect())
    }

    /// Message recorded on the job and sent in its terminal event.
    pub fn job_message(&self) -> String {
        match self {
            WorkerError::Media(MediaError::Cancelled) => "Cancelled".to_string(),
            WorkerError::Media(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::ArtifactMissing(_) => "artifact_missing",
            WorkerError::Panicked(_) => "panic",
            WorkerError::Media(MediaError::Cancelled) => "cancelled",
            WorkerError::Media(MediaError::Timeout(_)) => "timeout",
            WorkerError::Media(MediaError::ToolFailed { .. }) => "tool_failed",
            WorkerError::Media(MediaError::DependencyMissing(_)) => "dependency_missing",
            WorkerError::Media(_) | WorkerError::Io(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_messages() {
        assert_eq!(
            WorkerError::from(MediaError::tool_failed(Some(1), None)).job_message(),
            "yt-dlp failed (exit code 1)"
        );
        assert_eq!(
            WorkerError::ArtifactMissing(PathBuf::from("x.mp4")).job_message(),
            "Output file not found after download"
        );
        assert_eq!(
            WorkerError::from(MediaError::Timeout(60)).job_message(),
            "Timed out after 60 seconds"
        );
        assert_eq!(
            WorkerError::from(MediaError::Cancelled).job_message(),
            "Cancelled"
        );
    }

    #[test]
    fn test_panic_message_truncated() {
        let long = "x".repeat(2000);
        let err = WorkerError::panicked(&long);
        assert_eq!(err.job_message().chars().count(), MAX_PANIC_MESSAGE_CHARS);
    }
}
