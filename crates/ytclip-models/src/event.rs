//! Progress events streamed to clients.
//!
//! The wire shape is `{pct, msg, done, ok}`; `pct` is omitted when unknown.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One progress update for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    /// Fractional completion in [0.0, 1.0]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct: Option<f64>,
    /// Human-readable status
    pub msg: String,
    /// Terminal event marker
    #[serde(default)]
    pub done: bool,
    /// Success flag, meaningful only when `done` is true
    #[serde(default)]
    pub ok: bool,
}

impl ProgressEvent {
    /// Create a non-terminal progress update. The fraction is clamped.
    pub fn progress(pct: f64, msg: impl Into<String>) -> Self {
        Self {
            pct: Some(pct.clamp(0.0, 1.0)),
            msg: msg.into(),
            done: false,
            ok: false,
        }
    }

    /// Non-terminal status message without a fraction.
    pub fn status(msg: impl Into<String>) -> Self {
        Self {
            pct: None,
            msg: msg.into(),
            done: false,
            ok: false,
        }
    }

    /// The synthetic 100% event emitted when the child process exits.
    pub fn complete() -> Self {
        Self::progress(1.0, "Complete")
    }

    /// Terminal success event.
    pub fn succeeded(msg: impl Into<String>) -> Self {
        Self {
            pct: Some(1.0),
            msg: msg.into(),
            done: true,
            ok: true,
        }
    }

    /// Terminal failure event.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            pct: None,
            msg: msg.into(),
            done: true,
            ok: false,
        }
    }

    /// Terminal event for an unknown job.
    pub fn not_found() -> Self {
        Self::failed("Job not found")
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }
}
