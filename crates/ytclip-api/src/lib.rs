//! Axum HTTP API server.
//!
//! This crate provides:
//! - Clip submission, job status, cancellation and artifact download
//! - Server-sent progress events per job
//! - Metadata probing for pasted URLs
//! - Per-IP rate limiting, request IDs and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::JobSweeper;
pub use state::AppState;
