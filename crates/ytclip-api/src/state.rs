//! Application state.

use std::sync::Arc;

use ytclip_jobs::JobRegistry;
use ytclip_media::ToolEnv;
use ytclip_worker::{JobExecutor, WorkerConfig};

use crate::config::ApiConfig;
use crate::middleware::IpRateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: JobRegistry,
    pub executor: Arc<JobExecutor>,
    pub tools: ToolEnv,
    pub rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Create state with a yt-dlp backed executor.
    pub fn new(config: ApiConfig, worker: &WorkerConfig) -> Self {
        let registry = JobRegistry::new();
        let executor = JobExecutor::new(worker, registry.clone());
        Self::with_executor(config, executor, worker.tool_env())
    }

    /// Create state around an existing executor; its registry is shared.
    pub fn with_executor(config: ApiConfig, executor: JobExecutor, tools: ToolEnv) -> Self {
        Self {
            rate_limiter: IpRateLimiter::new(config.rate_limit_rps),
            config,
            registry: executor.registry().clone(),
            executor: Arc::new(executor),
            tools,
        }
    }
}
