//! Job registry error types.

use thiserror::Error;
use ytclip_models::JobId;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already finished: {0}")]
    AlreadyFinished(JobId),

    #[error("Job event stream already attached: {0}")]
    AlreadySubscribed(JobId),
}
