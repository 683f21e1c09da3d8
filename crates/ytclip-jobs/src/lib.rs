//! In-memory job registry and progress relay.
//!
//! This crate provides:
//! - Job allocation, status snapshots and terminal bookkeeping
//! - A private FIFO event channel per job
//! - A relay stream that drains one job's events with keep-alives
//! - TTL eviction of finished jobs

pub mod error;
pub mod registry;
pub mod relay;

pub use error::{JobError, JobResult};
pub use registry::{Eviction, JobEvents, JobRegistry, RecvOutcome, Subscription};
pub use relay::{relay, RelayItem, DEFAULT_KEEPALIVE};
