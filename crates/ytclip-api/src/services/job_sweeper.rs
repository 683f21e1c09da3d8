//! Background service that evicts finished jobs.
//!
//! Runs periodically to:
//! - Drop finished jobs older than the configured TTL from the registry
//! - Delete the clip files those jobs produced
//! - Forget rate limiter state for idle clients

use std::io::ErrorKind;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use ytclip_jobs::JobRegistry;

use crate::metrics::record_jobs_evicted;
use crate::middleware::IpRateLimiter;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Finished job sweeper.
pub struct JobSweeper {
    registry: JobRegistry,
    ttl: Duration,
    sweep_interval: Duration,
    rate_limiter: Option<IpRateLimiter>,
}

impl JobSweeper {
    /// Create a sweeper that evicts jobs finished more than `ttl` ago.
    pub fn new(registry: JobRegistry, ttl: Duration) -> Self {
        let sweep_interval = (ttl / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);
        Self {
            registry,
            ttl,
            sweep_interval,
            rate_limiter: None,
        }
    }

    /// Also prune idle clients from the rate limiter on every sweep.
    pub fn with_rate_limiter(mut self, rate_limiter: IpRateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Run the sweep loop until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting job sweeper (ttl: {:?}, interval: {:?})",
            self.ttl, self.sweep_interval
        );

        let mut ticker = interval(self.sweep_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Job sweeper stopped");
    }

    /// Run a single eviction cycle. Returns the number of jobs evicted.
    pub async fn sweep_once(&self) -> usize {
        let eviction = self.registry.evict_expired(self.ttl);
        let evicted = eviction.jobs;

        for file in eviction.files {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => debug!(path = %file.display(), "Removed expired clip"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %file.display(), "Failed to remove expired clip: {}", e),
            }
        }

        if let Some(limiter) = &self.rate_limiter {
            limiter.prune();
        }

        if evicted > 0 {
            record_jobs_evicted(evicted);
            info!("Evicted {} expired jobs", evicted);
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytclip_models::JobOutcome;

    #[test]
    fn test_sweep_interval_is_clamped() {
        let registry = JobRegistry::new();
        assert_eq!(
            JobSweeper::new(registry.clone(), Duration::from_secs(3600)).sweep_interval(),
            MAX_SWEEP_INTERVAL
        );
        assert_eq!(
            JobSweeper::new(registry.clone(), Duration::from_secs(2)).sweep_interval(),
            MIN_SWEEP_INTERVAL
        );
        assert_eq!(
            JobSweeper::new(registry, Duration::from_secs(40)).sweep_interval(),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn test_sweep_removes_finished_jobs_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"mp4").unwrap();

        let registry = JobRegistry::new();
        let done = registry.create();
        let pending = registry.create();
        assert!(registry.finish(&done, JobOutcome::Done { file: clip.clone() }));

        let sweeper = JobSweeper::new(registry.clone(), Duration::ZERO);
        assert_eq!(sweeper.sweep_once().await, 1);

        assert!(registry.get(&done).is_none());
        assert!(registry.get(&pending).is_some());
        assert!(!clip.exists());
    }

    #[tokio::test]
    async fn test_sweep_spares_file_of_newer_job() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip_dQw4w9WgXcQ_10-20.mp4");
        std::fs::write(&clip, b"mp4").unwrap();

        let registry = JobRegistry::new();
        let older = registry.create();
        registry.finish(&older, JobOutcome::Done { file: clip.clone() });
        tokio::time::sleep(Duration::from_millis(1200)).await;
        let newer = registry.create();
        registry.finish(&newer, JobOutcome::Done { file: clip.clone() });

        let sweeper = JobSweeper::new(registry.clone(), Duration::from_secs(1));
        assert_eq!(sweeper.sweep_once().await, 1);

        assert!(registry.get(&older).is_none());
        assert!(registry.get(&newer).is_some());
        assert!(clip.exists());
    }

    #[tokio::test]
    async fn test_sweep_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::new();
        let done = registry.create();
        registry.finish(
            &done,
            JobOutcome::Done {
                file: dir.path().join("already-gone.mp4"),
            },
        );

        let sweeper = JobSweeper::new(registry.clone(), Duration::ZERO);
        assert_eq!(sweeper.sweep_once().await, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_keeps_recent_jobs() {
        let registry = JobRegistry::new();
        let failed = registry.create();
        registry.finish(
            &failed,
            JobOutcome::Failed {
                message: "boom".to_string(),
            },
        );

        let sweeper = JobSweeper::new(registry.clone(), Duration::from_secs(3600));
        assert_eq!(sweeper.sweep_once().await, 0);
        assert!(registry.get(&failed).is_some());

        let sweeper = JobSweeper::new(registry.clone(), Duration::ZERO);
        assert_eq!(sweeper.sweep_once().await, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let sweeper = JobSweeper::new(JobRegistry::new(), Duration::from_secs(3600));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sweeper.run(rx).await });

        tx.send(true).unwrap();
        tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(1), handle).await);
    }
}
