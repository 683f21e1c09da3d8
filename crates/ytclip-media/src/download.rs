//! Clip download using yt-dlp.
//!
//! One call spawns one yt-dlp child. Its stderr and stdout are read by two
//! dedicated tasks so the child never stalls on a full pipe while the
//! caller waits for it to exit.

use std::collections::VecDeque;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ytclip_models::{ClipRequest, ProgressEvent};

use crate::command::{ToolEnv, YtDlpCommand};
use crate::error::{MediaError, MediaResult};
use crate::progress::{next_output_line, parse_progress_line, ProgressSink};

/// How long to wait for the output readers after the child exits.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of trailing stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// Retry settings passed to yt-dlp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// `--retries`
    pub retries: u32,
    /// `--fragment-retries`
    pub fragment_retries: u32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            retries: 10,
            fragment_retries: 10,
        }
    }
}

/// Something that can fetch a clip to a local file.
///
/// Success means the tool reported success; the caller verifies the
/// artifact exists.
#[async_trait]
pub trait ClipDownloader: Send + Sync {
    async fn download(
        &self,
        request: &ClipRequest,
        output: &Path,
        sink: ProgressSink,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<()>;
}

/// Production downloader that shells out to yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    env: ToolEnv,
    options: DownloadOptions,
    timeout: Option<Duration>,
}

impl YtDlpDownloader {
    /// Create a new downloader.
    pub fn new(env: ToolEnv, options: DownloadOptions) -> Self {
        Self {
            env,
            options,
            timeout: None,
        }
    }

    /// Kill the child if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn env(&self) -> &ToolEnv {
        &self.env
    }
}

enum ChildExit {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut(Duration),
}

#[async_trait]
impl ClipDownloader for YtDlpDownloader {
    async fn download(
        &self,
        request: &ClipRequest,
        output: &Path,
        sink: ProgressSink,
        mut cancel: watch::Receiver<bool>,
    ) -> MediaResult<()> {
        let program = self.env.resolve_ytdlp()?;

        info!(
            video_id = %request.video_id,
            section = %request.section_arg(),
            quality = %request.quality,
            output = %output.display(),
            "Starting clip download"
        );

        let mut child = YtDlpCommand::for_clip(request, output, &self.options)
            .into_command(&program, &self.env)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::DependencyMissing("yt-dlp"),
                _ => MediaError::Io(e),
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;

        let duration = request.duration_secs();
        let stderr_task = spawn_reader(stderr, duration, sink.clone(), "stderr");
        let stdout_task = spawn_reader(stdout, duration, sink.clone(), "stdout");

        let timeout = self.timeout;
        let exit = tokio::select! {
            status = child.wait() => ChildExit::Exited(status),
            _ = wait_cancelled(&mut cancel) => ChildExit::Cancelled,
            _ = wait_deadline(timeout) => ChildExit::TimedOut(timeout.unwrap_or_default()),
        };

        let status = match exit {
            ChildExit::Exited(status) => status?,
            ChildExit::Cancelled => {
                info!(video_id = %request.video_id, "Download cancelled, killing yt-dlp");
                let _ = child.kill().await;
                join_reader(stderr_task).await;
                join_reader(stdout_task).await;
                return Err(MediaError::Cancelled);
            }
            ChildExit::TimedOut(limit) => {
                warn!(
                    video_id = %request.video_id,
                    "yt-dlp timed out after {} seconds, killing process",
                    limit.as_secs()
                );
                let _ = child.kill().await;
                join_reader(stderr_task).await;
                join_reader(stdout_task).await;
                return Err(MediaError::Timeout(limit.as_secs()));
            }
        };

        let stderr_tail = join_reader(stderr_task).await;
        join_reader(stdout_task).await;

        sink(ProgressEvent::complete());

        if status.success() {
            info!(video_id = %request.video_id, "yt-dlp finished");
            Ok(())
        } else {
            let tail = stderr_tail.and_then(|lines| lines.back().cloned());
            warn!(
                video_id = %request.video_id,
                exit_code = ?status.code(),
                last_line = tail.as_deref().unwrap_or(""),
                "yt-dlp exited with non-zero status"
            );
            Err(MediaError::tool_failed(status.code(), tail))
        }
    }
}

/// Drain one output stream, scraping progress as it goes.
///
/// Returns the last few non-empty lines for error reporting.
fn spawn_reader<R>(
    stream: R,
    clip_duration_secs: u64,
    sink: ProgressSink,
    name: &'static str,
) -> JoinHandle<VecDeque<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

        loop {
            match next_output_line(&mut reader, &mut buf).await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!(stream = name, "yt-dlp> {}", line);
                    if let Some(event) = parse_progress_line(&line, clip_duration_secs) {
                        sink(event);
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(stream = name, "Stopped reading yt-dlp output: {}", e);
                    break;
                }
            }
        }

        tail
    })
}

/// Join a reader task, giving up after [`READER_JOIN_TIMEOUT`].
async fn join_reader(handle: JoinHandle<VecDeque<String>>) -> Option<VecDeque<String>> {
    match tokio::time::timeout(READER_JOIN_TIMEOUT, handle).await {
        Ok(Ok(tail)) => Some(tail),
        Ok(Err(e)) => {
            warn!("yt-dlp output reader failed: {}", e);
            None
        }
        Err(_) => {
            warn!(
                "yt-dlp output reader did not finish within {:?}",
                READER_JOIN_TIMEOUT
            );
            None
        }
    }
}

/// Resolve once the cancel flag is set. Never resolves if the sender is gone.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn wait_deadline(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}
