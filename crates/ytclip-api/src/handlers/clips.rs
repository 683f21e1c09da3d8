//! Clip submission handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use ytclip_models::{parse_time_input, ClipRequest, Quality, TimestampError};

use crate::error::ApiResult;
use crate::state::AppState;

/// A time given either as whole seconds or as `SS`, `M:SS` or `H:MM:SS`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimeInput {
    Seconds(u64),
    Clock(String),
}

impl TimeInput {
    pub fn to_seconds(&self) -> Result<u64, TimestampError> {
        match self {
            TimeInput::Seconds(secs) => Ok(*secs),
            TimeInput::Clock(text) => parse_time_input(text),
        }
    }
}

/// Clip submission body.
#[derive(Debug, Deserialize)]
pub struct SubmitClipRequest {
    pub url: String,
    /// Quality label; unrecognized labels fall back to yt-dlp's `best`
    #[serde(default)]
    pub quality: Option<String>,
    pub start: TimeInput,
    pub end: TimeInput,
}

#[derive(Debug, Serialize)]
pub struct SubmitClipResponse {
    pub job_id: String,
    pub video_id: String,
    pub filename: String,
}

/// Validate a clip request, register a job and start it in the background.
///
/// Responds as soon as the job is registered; progress is read from the
/// job's event stream.
pub async fn submit_clip(
    State(state): State<AppState>,
    Json(body): Json<SubmitClipRequest>,
) -> ApiResult<(StatusCode, Json<SubmitClipResponse>)> {
    let quality = body
        .quality
        .as_deref()
        .map(Quality::parse)
        .unwrap_or_default();
    let start = body.start.to_seconds()?;
    let end = body.end.to_seconds()?;

    let request = ClipRequest::new(&body.url, quality, start, end)?;

    let job_id = state.registry.create();
    let response = SubmitClipResponse {
        job_id: job_id.to_string(),
        video_id: request.video_id.clone(),
        filename: request.output_file_name(),
    };

    info!(
        job_id = %job_id,
        video_id = %request.video_id,
        section = %request.section_arg(),
        quality = %request.quality,
        "Clip job submitted"
    );

    // Detached; the executor records the outcome in the registry.
    let _ = state.executor.submit(job_id, request);

    Ok((StatusCode::ACCEPTED, Json(response)))
}
