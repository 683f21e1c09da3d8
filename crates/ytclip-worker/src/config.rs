//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use ytclip_media::{DownloadOptions, ToolEnv};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent downloads
    pub max_concurrent_jobs: usize,
    /// Per-job limit before yt-dlp is killed
    pub job_timeout: Duration,
    /// Directory clips are written to
    pub output_dir: PathBuf,
    /// yt-dlp program name or path
    pub ytdlp_bin: PathBuf,
    /// Directories prepended to the children's PATH
    pub tool_search_paths: Vec<PathBuf>,
    /// `--retries` passed to yt-dlp
    pub ytdlp_retries: u32,
    /// `--fragment-retries` passed to yt-dlp
    pub ytdlp_fragment_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            job_timeout: Duration::from_secs(1800), // 30 minutes
            output_dir: PathBuf::from("downloads"),
            ytdlp_bin: PathBuf::from("yt-dlp"),
            tool_search_paths: Vec::new(),
            ytdlp_retries: 10,
            ytdlp_fragment_retries: 10,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            job_timeout: env_parse("JOB_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            output_dir: std::env::var_os("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            ytdlp_bin: std::env::var_os("YTDLP_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_bin),
            tool_search_paths: std::env::var_os("TOOL_SEARCH_PATHS")
                .map(|paths| std::env::split_paths(&paths).collect())
                .unwrap_or_default(),
            ytdlp_retries: env_parse("YTDLP_RETRIES").unwrap_or(defaults.ytdlp_retries),
            ytdlp_fragment_retries: env_parse("YTDLP_FRAGMENT_RETRIES")
                .unwrap_or(defaults.ytdlp_fragment_retries),
        }
    }

    /// Tool environment for spawning yt-dlp and probing for ffmpeg.
    pub fn tool_env(&self) -> ToolEnv {
        ToolEnv::new()
            .with_ytdlp_bin(&self.ytdlp_bin)
            .with_search_paths(self.tool_search_paths.iter().cloned())
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            retries: self.ytdlp_retries,
            fragment_retries: self.ytdlp_fragment_retries,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
