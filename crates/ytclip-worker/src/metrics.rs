//! Job metrics.

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "ytclip_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "ytclip_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "ytclip_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "ytclip_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "ytclip_jobs_duration_seconds";
}

pub fn record_job_submitted(quality: &str) {
    let labels = [("quality", quality.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "done").record(duration_secs);
}

/// Record a failed job, labelled by failure kind.
pub fn record_job_failed(kind: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "error").record(duration_secs);
}

pub fn job_started() {
    gauge!(names::JOBS_IN_FLIGHT).increment(1.0);
}

pub fn job_finished() {
    gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
}
