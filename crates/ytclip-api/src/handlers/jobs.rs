//! Job status, artifact download and cancellation handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use ytclip_models::{JobId, JobSnapshot, JobStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Job status response.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    /// pending, done or error
    pub status: JobStatus,
    /// Error message if the job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Artifact file name once the job is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl From<JobSnapshot> for JobStatusResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            job_id: snapshot.id.to_string(),
            status: snapshot.status,
            message: snapshot.message,
            filename: snapshot
                .file
                .as_deref()
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned()),
            created_at: snapshot.created_at.to_rfc3339(),
            finished_at: snapshot.finished_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub job_id: String,
    pub status: String,
}

/// Get a job's current status.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let snapshot = state
        .registry
        .get(&JobId::from_string(job_id))
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(Json(snapshot.into()))
}

/// Serve a finished job's clip.
///
/// Unknown, pending and failed jobs are all 404, as is a done job whose
/// file has disappeared from disk.
pub async fn download_clip(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let snapshot = state
        .registry
        .get(&JobId::from_string(job_id))
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let file = match (snapshot.status, snapshot.file) {
        (JobStatus::Done, Some(file)) => file,
        _ => return Err(ApiError::not_found("File not ready")),
    };

    let bytes = match tokio::fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(job_id = %snapshot.id, file = %file.display(), "Artifact missing from disk");
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => return Err(ApiError::internal(e.to_string())),
    };

    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip.mp4".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// Request cancellation of an in-flight job.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<CancelJobResponse>)> {
    let job_id = JobId::from_string(job_id);
    state.registry.cancel(&job_id)?;
    info!(job_id = %job_id, "Cancellation requested via API");

    Ok((
        StatusCode::ACCEPTED,
        Json(CancelJobResponse {
            job_id: job_id.to_string(),
            status: "cancelling".to_string(),
        }),
    ))
}
