//! Structured job logging.

use tracing::{error, info, warn, Span};
use ytclip_models::{ClipRequest, JobId};

/// Logs job lifecycle events with the job and video IDs attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    video_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, request: &ClipRequest) -> Self {
        Self {
            job_id: job_id.to_string(),
            video_id: request.video_id.clone(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, video_id = %self.video_id, "Job started: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, video_id = %self.video_id, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, video_id = %self.video_id, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, video_id = %self.video_id, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Span wrapping the whole job task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("clip_job", job_id = %self.job_id, video_id = %self.video_id)
    }
}
