//! Job executor.
//!
//! Each submitted job runs on its own tokio task. A semaphore bounds how
//! many downloads run at once; jobs beyond the bound wait for a permit.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, Instrument};

use ytclip_jobs::JobRegistry;
use ytclip_media::{ClipDownloader, MediaError, ProgressSink, YtDlpDownloader};
use ytclip_models::{ClipRequest, JobId, JobOutcome, ProgressEvent};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Runs clip downloads in the background and records their outcome.
pub struct JobExecutor {
    registry: JobRegistry,
    downloader: Arc<dyn ClipDownloader>,
    output_dir: PathBuf,
    max_concurrent_jobs: usize,
    job_semaphore: Arc<Semaphore>,
}

impl JobExecutor {
    /// Create an executor backed by yt-dlp.
    pub fn new(config: &WorkerConfig, registry: JobRegistry) -> Self {
        let downloader = YtDlpDownloader::new(config.tool_env(), config.download_options())
            .with_timeout(config.job_timeout);
        Self::with_downloader(config, registry, Arc::new(downloader))
    }

    /// Create an executor with a custom downloader.
    pub fn with_downloader(
        config: &WorkerConfig,
        registry: JobRegistry,
        downloader: Arc<dyn ClipDownloader>,
    ) -> Self {
        let max_concurrent_jobs = config.max_concurrent_jobs.max(1);
        Self {
            registry,
            downloader,
            output_dir: config.output_dir.clone(),
            max_concurrent_jobs,
            job_semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of jobs currently holding a worker slot.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent_jobs - self.job_semaphore.available_permits()
    }

    /// Start a job in the background and return immediately.
    ///
    /// The job must already exist in the registry. Whatever happens to the
    /// task, the job ends with exactly one terminal event.
    pub fn submit(&self, job_id: JobId, request: ClipRequest) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let downloader = Arc::clone(&self.downloader);
        let semaphore = Arc::clone(&self.job_semaphore);
        let output = self.output_dir.join(request.output_file_name());
        let logger = JobLogger::new(&job_id, &request);
        let span = logger.create_span();

        metrics::record_job_submitted(request.quality.as_str());

        tokio::spawn(
            async move {
                if semaphore.available_permits() == 0 {
                    registry.emit(&job_id, ProgressEvent::status("Waiting for a free worker"));
                }
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    registry.finish(
                        &job_id,
                        JobOutcome::Failed {
                            message: "Worker pool is shut down".to_string(),
                        },
                    );
                    return;
                };

                let Some(cancel) = registry.cancel_signal(&job_id) else {
                    logger.log_warning("job vanished from registry before start");
                    return;
                };

                logger.log_start(&request.section_arg());
                let started = Instant::now();
                metrics::job_started();

                // Run in a nested task so a panic surfaces as a JoinError
                // instead of taking the bookkeeping below down with it.
                let job = tokio::spawn(
                    run_job(
                        registry.clone(),
                        downloader,
                        job_id.clone(),
                        request,
                        output,
                        cancel,
                    )
                    .in_current_span(),
                );
                let result = match job.await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(WorkerError::panicked(panic_message(e.into_panic()))),
                    Err(e) => Err(WorkerError::panicked(e.to_string())),
                };

                metrics::job_finished();
                let elapsed = started.elapsed().as_secs_f64();

                match result {
                    Ok(file) => {
                        logger.log_completion(&file.display().to_string());
                        metrics::record_job_completed(elapsed);
                        registry.finish(&job_id, JobOutcome::Done { file });
                    }
                    Err(e) => {
                        let message = e.job_message();
                        match &e {
                            WorkerError::Media(MediaError::Cancelled) => {
                                info!(job_id = %job_id, "Job cancelled")
                            }
                            _ => logger.log_error(&message),
                        }
                        metrics::record_job_failed(e.kind(), elapsed);
                        registry.finish(&job_id, JobOutcome::Failed { message });
                    }
                }
            }
            .instrument(span),
        )
    }

    /// Wait until no job holds a worker slot, up to `timeout`.
    ///
    /// Returns `false` if jobs were still running when the timeout hit.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let idle = async {
            while self.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }
}

/// Download one clip and verify the artifact.
async fn run_job(
    registry: JobRegistry,
    downloader: Arc<dyn ClipDownloader>,
    job_id: JobId,
    request: ClipRequest,
    output: PathBuf,
    cancel: watch::Receiver<bool>,
) -> WorkerResult<PathBuf> {
    if *cancel.borrow() {
        return Err(MediaError::Cancelled.into());
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    registry.emit(&job_id, ProgressEvent::status("Starting download"));

    let sink: ProgressSink = {
        let registry = registry.clone();
        let job_id = job_id.clone();
        Arc::new(move |event| {
            registry.emit(&job_id, event);
        })
    };

    downloader.download(&request, &output, sink, cancel).await?;

    if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
        debug!(job_id = %job_id, output = %output.display(), "Expected artifact is missing");
        return Err(WorkerError::ArtifactMissing(output));
    }

    Ok(output)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Job panicked".to_string()
    }
}
