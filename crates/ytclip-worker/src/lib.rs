//! Background clip download worker.
//!
//! This crate provides:
//! - A semaphore-bounded executor that runs one task per submitted job
//! - Artifact verification and terminal bookkeeping in the job registry
//! - Mapping of every failure, panics included, to a job error message

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
