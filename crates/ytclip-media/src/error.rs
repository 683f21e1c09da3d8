//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while driving the external tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    DependencyMissing(&'static str),

    #[error("yt-dlp failed (exit code {})", exit_code_label(.exit_code))]
    ToolFailed {
        exit_code: Option<i32>,
        stderr_tail: Option<String>,
    },

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "unknown".to_string(),
    }
}

impl MediaError {
    /// Create a tool failure error.
    pub fn tool_failed(exit_code: Option<i32>, stderr_tail: Option<String>) -> Self {
        Self::ToolFailed {
            exit_code,
            stderr_tail,
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(message: impl Into<String>) -> Self {
        Self::ProbeFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failed_message() {
        assert_eq!(
            MediaError::tool_failed(Some(1), None).to_string(),
            "yt-dlp failed (exit code 1)"
        );
        assert_eq!(
            MediaError::tool_failed(None, None).to_string(),
            "yt-dlp failed (exit code unknown)"
        );
    }
}
