//! Job registry.
//!
//! A single coarse lock guards the map. It is held only for the duration of
//! a map operation (event sends are non-blocking) and never across an await.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use ytclip_models::{JobId, JobOutcome, JobSnapshot, JobStatus, ProgressEvent};

use crate::error::{JobError, JobResult};

struct JobEntry {
    status: JobStatus,
    file: Option<PathBuf>,
    message: Option<String>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    /// Producer side; dropped once the terminal event is queued
    events_tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    /// Consumer side; `None` while a relay holds it or once drained
    events_rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
    /// Terminal event has been delivered to a consumer
    drained: bool,
    cancel_tx: watch::Sender<bool>,
}

impl JobEntry {
    fn snapshot(&self, id: &JobId) -> JobSnapshot {
        JobSnapshot {
            id: id.clone(),
            status: self.status,
            file: self.file.clone(),
            message: self.message.clone(),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }

    fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        if status.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    /// The `done=true` event matching the entry's current outcome.
    fn terminal_event(&self) -> ProgressEvent {
        match self.status {
            JobStatus::Done => ProgressEvent::succeeded("Done"),
            _ => ProgressEvent::failed(
                self.message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
        }
    }

    /// Queue the terminal event and drop the sender behind it.
    fn close_events(&mut self) {
        if let Some(tx) = self.events_tx.take() {
            let _ = tx.send(self.terminal_event());
        }
    }
}

/// Result of attaching to a job's event channel.
pub enum Subscription {
    /// Live FIFO of the job's events
    Live(JobEvents),
    /// The terminal event was already delivered; this is a reconstruction
    Replay(ProgressEvent),
}

/// In-memory registry of jobs, shared by handlers and workers.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        // Entries stay consistent across a panicking holder: every
        // mutation is a plain field assignment.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a pending job with an empty event channel.
    pub fn create(&self) -> JobId {
        let id = JobId::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (cancel_tx, _) = watch::channel(false);

        let entry = JobEntry {
            status: JobStatus::Pending,
            file: None,
            message: None,
            created_at: Utc::now(),
            finished_at: None,
            events_tx: Some(events_tx),
            events_rx: Some(events_rx),
            drained: false,
            cancel_tx,
        };

        self.lock().insert(id.clone(), entry);
        debug!(job_id = %id, "Job created");
        id
    }

    /// Current snapshot of a job.
    pub fn get(&self, id: &JobId) -> Option<JobSnapshot> {
        self.lock().get(id).map(|entry| entry.snapshot(id))
    }

    /// Number of jobs currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of jobs still pending.
    pub fn pending_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.status == JobStatus::Pending)
            .count()
    }

    /// Overwrite a job's status fields in one step.
    ///
    /// Moving a job into a terminal status queues its terminal event, the
    /// same as [`JobRegistry::finish`]. A job that already finished is left
    /// untouched and `AlreadyFinished` is returned.
    pub fn update(
        &self,
        id: &JobId,
        status: JobStatus,
        file: Option<PathBuf>,
        message: Option<String>,
    ) -> JobResult<()> {
        let mut jobs = self.lock();
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.clone()))?;
        if entry.status.is_terminal() {
            return Err(JobError::AlreadyFinished(id.clone()));
        }
        entry.file = file;
        entry.message = message;
        entry.set_status(status);
        if status.is_terminal() {
            entry.close_events();
            info!(job_id = %id, status = status.as_str(), "Job finished");
        }
        Ok(())
    }

    /// Queue a non-terminal progress event.
    ///
    /// Returns `false` if the job is unknown or already finished. Terminal
    /// events are rejected here; they are produced only by `finish`.
    pub fn emit(&self, id: &JobId, event: ProgressEvent) -> bool {
        if event.is_terminal() {
            return false;
        }
        let jobs = self.lock();
        match jobs.get(id).and_then(|entry| entry.events_tx.as_ref()) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Record the job's outcome and queue its terminal event.
    ///
    /// Only the first call for a job has any effect; it returns `true`.
    pub fn finish(&self, id: &JobId, outcome: JobOutcome) -> bool {
        let mut jobs = self.lock();
        let Some(entry) = jobs.get_mut(id) else {
            return false;
        };
        if entry.status.is_terminal() {
            return false;
        }

        match outcome {
            JobOutcome::Done { file } => {
                entry.file = Some(file);
                entry.message = None;
                entry.set_status(JobStatus::Done);
            }
            JobOutcome::Failed { message } => {
                entry.file = None;
                entry.message = Some(message);
                entry.set_status(JobStatus::Error);
            }
        }

        entry.close_events();
        info!(job_id = %id, status = entry.status.as_str(), "Job finished");
        true
    }

    /// Receiver for the job's cancel flag.
    pub fn cancel_signal(&self, id: &JobId) -> Option<watch::Receiver<bool>> {
        self.lock().get(id).map(|entry| entry.cancel_tx.subscribe())
    }

    /// Ask an in-flight job to stop.
    pub fn cancel(&self, id: &JobId) -> JobResult<()> {
        let jobs = self.lock();
        let entry = jobs.get(id).ok_or_else(|| JobError::NotFound(id.clone()))?;
        if entry.status.is_terminal() {
            return Err(JobError::AlreadyFinished(id.clone()));
        }
        entry.cancel_tx.send_replace(true);
        info!(job_id = %id, "Job cancellation requested");
        Ok(())
    }

    /// Attach to a job's event channel.
    ///
    /// At most one live consumer exists per job. A consumer that goes away
    /// before the terminal event hands the channel back, so a later
    /// subscriber resumes where it stopped.
    pub fn subscribe(&self, id: &JobId) -> JobResult<Subscription> {
        let mut jobs = self.lock();
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.clone()))?;

        if let Some(rx) = entry.events_rx.take() {
            return Ok(Subscription::Live(JobEvents {
                id: id.clone(),
                rx: Some(rx),
                registry: self.clone(),
                finished: false,
            }));
        }

        if entry.drained {
            return Ok(Subscription::Replay(entry.terminal_event()));
        }

        Err(JobError::AlreadySubscribed(id.clone()))
    }

    fn restore_receiver(&self, id: &JobId, rx: mpsc::UnboundedReceiver<ProgressEvent>) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.events_rx = Some(rx);
        }
    }

    fn mark_drained(&self, id: &JobId) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.drained = true;
        }
    }

    /// Remove finished jobs older than `ttl`.
    ///
    /// Deleting the artifact files of evicted jobs is the caller's job.
    /// Clip file names are deterministic, so a path still referenced by a
    /// retained job is left out of the returned files.
    pub fn evict_expired(&self, ttl: Duration) -> Eviction {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut jobs = self.lock();

        let expired: Vec<JobId> = jobs
            .iter()
            .filter(|(_, entry)| {
                entry
                    .finished_at
                    .is_some_and(|finished| now.signed_duration_since(finished) >= ttl)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut eviction = Eviction::default();
        let mut released = Vec::new();
        for id in expired {
            if let Some(entry) = jobs.remove(&id) {
                debug!(job_id = %id, "Evicted finished job");
                eviction.jobs += 1;
                released.extend(entry.file);
            }
        }

        let mut seen: HashSet<PathBuf> = jobs
            .values()
            .filter_map(|entry| entry.file.clone())
            .collect();
        eviction.files = released
            .into_iter()
            .filter(|file| seen.insert(file.clone()))
            .collect();
        eviction
    }
}

/// Result of one [`JobRegistry::evict_expired`] pass.
#[derive(Debug, Default, PartialEq)]
pub struct Eviction {
    /// Number of jobs removed
    pub jobs: usize,
    /// Artifacts left behind by the removed jobs
    pub files: Vec<PathBuf>,
}

/// What a consumer got from waiting on a job's channel.
#[derive(Debug, PartialEq)]
pub enum RecvOutcome {
    /// Next event in FIFO order
    Event(ProgressEvent),
    /// Nothing arrived within the wait
    Idle,
    /// Channel is closed and empty
    Closed,
}

/// Exclusive consumer handle for one job's events.
pub struct JobEvents {
    id: JobId,
    rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
    registry: JobRegistry,
    finished: bool,
}

impl JobEvents {
    pub fn job_id(&self) -> &JobId {
        &self.id
    }

    /// Wait up to `wait` for the next event.
    ///
    /// After the terminal event the channel is released for good and all
    /// further calls return `Closed`.
    pub async fn recv_timeout(&mut self, wait: Duration) -> RecvOutcome {
        let Some(rx) = self.rx.as_mut() else {
            return RecvOutcome::Closed;
        };

        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                    self.rx = None;
                    self.registry.mark_drained(&self.id);
                }
                RecvOutcome::Event(event)
            }
            Ok(None) => {
                self.finished = true;
                self.rx = None;
                RecvOutcome::Closed
            }
            Err(_) => RecvOutcome::Idle,
        }
    }
}

impl Drop for JobEvents {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(rx) = self.rx.take() {
            debug!(job_id = %self.id, "Event consumer detached before terminal event");
            self.registry.restore_receiver(&self.id, rx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(50);

    async fn drain(events: &mut JobEvents) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        loop {
            match events.recv_timeout(WAIT).await {
                RecvOutcome::Event(event) => out.push(event),
                RecvOutcome::Idle | RecvOutcome::Closed => return out,
            }
        }
    }

    fn live(sub: JobResult<Subscription>) -> JobEvents {
        match sub {
            Ok(Subscription::Live(events)) => events,
            Ok(Subscription::Replay(_)) => panic!("expected live subscription, got replay"),
            Err(e) => panic!("expected live subscription, got {e}"),
        }
    }

    #[test]
    fn test_create_and_get() {
        let registry = JobRegistry::new();
        let id = registry.create();
        let snapshot = registry.get(&id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Pending);
        assert!(snapshot.file.is_none());
        assert!(snapshot.message.is_none());
        assert!(registry.get(&JobId::from_string("nope")).is_none());
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_update_sets_fields() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry
            .update(&id, JobStatus::Error, None, Some("boom".to_string()))
            .unwrap();
        let snapshot = registry.get(&id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert_eq!(snapshot.message.as_deref(), Some("boom"));
        assert!(snapshot.finished_at.is_some());

        assert_eq!(
            registry.update(&JobId::from_string("nope"), JobStatus::Done, None, None),
            Err(JobError::NotFound(JobId::from_string("nope")))
        );
    }

    #[tokio::test]
    async fn test_terminal_update_emits_single_terminal_event() {
        let registry = JobRegistry::new();
        let id = registry.create();
        assert!(registry.emit(&id, ProgressEvent::status("Starting download")));
        registry
            .update(&id, JobStatus::Done, Some(PathBuf::from("/tmp/a.mp4")), None)
            .unwrap();

        assert!(!registry.finish(&id, JobOutcome::Done { file: PathBuf::from("/tmp/a.mp4") }));
        assert_eq!(
            registry.update(&id, JobStatus::Error, None, Some("late".to_string())),
            Err(JobError::AlreadyFinished(id.clone()))
        );
        assert!(!registry.emit(&id, ProgressEvent::status("late")));

        let mut events = live(registry.subscribe(&id));
        let received = drain(&mut events).await;
        assert_eq!(
            received,
            vec![
                ProgressEvent::status("Starting download"),
                ProgressEvent::succeeded("Done"),
            ]
        );
        assert_eq!(received.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(registry.get(&id).unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn test_non_terminal_update_keeps_channel_open() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.update(&id, JobStatus::Pending, None, None).unwrap();
        assert!(registry.emit(&id, ProgressEvent::status("still going")));
    }

    #[tokio::test]
    async fn test_events_are_fifo_with_single_terminal() {
        let registry = JobRegistry::new();
        let id = registry.create();

        assert!(registry.emit(&id, ProgressEvent::progress(0.1, "a")));
        assert!(registry.emit(&id, ProgressEvent::progress(0.5, "b")));
        assert!(registry.emit(&id, ProgressEvent::complete()));
        assert!(registry.finish(&id, JobOutcome::Done { file: PathBuf::from("/tmp/x.mp4") }));
        assert!(!registry.finish(&id, JobOutcome::Failed { message: "late".into() }));
        assert!(!registry.emit(&id, ProgressEvent::progress(0.9, "after")));
        assert!(!registry.emit(&JobId::from_string("nope"), ProgressEvent::status("x")));

        let mut events = live(registry.subscribe(&id));
        let received = drain(&mut events).await;
        let msgs: Vec<&str> = received.iter().map(|e| e.msg.as_str()).collect();
        assert_eq!(msgs, vec!["a", "b", "Complete", "Done"]);
        assert_eq!(received.iter().filter(|e| e.done).count(), 1);
        assert!(received.last().unwrap().ok);
        assert_eq!(events.recv_timeout(WAIT).await, RecvOutcome::Closed);
    }

    #[tokio::test]
    async fn test_terminal_events_cannot_be_emitted_directly() {
        let registry = JobRegistry::new();
        let id = registry.create();
        assert!(!registry.emit(&id, ProgressEvent::failed("sneaky")));
        assert_eq!(registry.get(&id).unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_second_live_subscriber_rejected() {
        let registry = JobRegistry::new();
        let id = registry.create();
        let _first = live(registry.subscribe(&id));
        assert!(matches!(
            registry.subscribe(&id),
            Err(JobError::AlreadySubscribed(_))
        ));
    }

    #[tokio::test]
    async fn test_detached_consumer_hands_channel_back() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.emit(&id, ProgressEvent::progress(0.1, "first"));
        registry.emit(&id, ProgressEvent::progress(0.2, "second"));

        {
            let mut events = live(registry.subscribe(&id));
            match events.recv_timeout(WAIT).await {
                RecvOutcome::Event(e) => assert_eq!(e.msg, "first"),
                other => panic!("unexpected {other:?}"),
            }
        }

        let mut events = live(registry.subscribe(&id));
        match events.recv_timeout(WAIT).await {
            RecvOutcome::Event(e) => assert_eq!(e.msg, "second"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events.recv_timeout(WAIT).await, RecvOutcome::Idle);
    }

    #[tokio::test]
    async fn test_replay_after_drain() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.finish(&id, JobOutcome::Failed { message: "yt-dlp failed (exit code 1)".into() });

        let mut events = live(registry.subscribe(&id));
        let received = drain(&mut events).await;
        assert_eq!(received.len(), 1);
        drop(events);

        match registry.subscribe(&id) {
            Ok(Subscription::Replay(event)) => {
                assert!(event.done);
                assert!(!event.ok);
                assert_eq!(event.msg, "yt-dlp failed (exit code 1)");
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn test_cancel() {
        let registry = JobRegistry::new();
        let id = registry.create();
        let signal = registry.cancel_signal(&id).unwrap();
        assert!(!*signal.borrow());

        tokio_test::assert_ok!(registry.cancel(&id));
        assert!(*signal.borrow());

        registry.finish(&id, JobOutcome::Failed { message: "Cancelled".into() });
        assert_eq!(registry.cancel(&id), Err(JobError::AlreadyFinished(id.clone())));
        assert!(matches!(
            registry.cancel(&JobId::from_string("nope")),
            Err(JobError::NotFound(_))
        ));
    }

    #[test]
    fn test_evict_expired_only_removes_finished() {
        let registry = JobRegistry::new();
        let pending = registry.create();
        let done = registry.create();
        let failed = registry.create();
        registry.finish(&done, JobOutcome::Done { file: PathBuf::from("/tmp/done.mp4") });
        registry.finish(&failed, JobOutcome::Failed { message: "x".into() });

        assert_eq!(registry.evict_expired(Duration::from_secs(3600)), Eviction::default());
        assert_eq!(registry.len(), 3);

        let eviction = registry.evict_expired(Duration::ZERO);
        assert_eq!(eviction.jobs, 2);
        assert_eq!(eviction.files, vec![PathBuf::from("/tmp/done.mp4")]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&pending).is_some());
    }

    #[test]
    fn test_evict_keeps_file_shared_with_retained_job() {
        let registry = JobRegistry::new();
        let shared = PathBuf::from("/tmp/clip_dQw4w9WgXcQ_10-20.mp4");
        let old = registry.create();
        registry.finish(&old, JobOutcome::Done { file: shared.clone() });
        let newer = registry.create();
        registry.finish(&newer, JobOutcome::Done { file: shared.clone() });

        // Age only the first job past the TTL.
        registry.lock().get_mut(&old).unwrap().finished_at =
            Some(Utc::now() - chrono::Duration::hours(2));

        let eviction = registry.evict_expired(Duration::from_secs(3600));
        assert_eq!(eviction.jobs, 1);
        assert!(eviction.files.is_empty());
        assert_eq!(registry.get(&newer).unwrap().file, Some(shared.clone()));

        let eviction = registry.evict_expired(Duration::ZERO);
        assert_eq!(eviction.jobs, 1);
        assert_eq!(eviction.files, vec![shared]);
    }

    #[test]
    fn test_evict_reports_shared_file_once() {
        let registry = JobRegistry::new();
        let shared = PathBuf::from("/tmp/clip_dQw4w9WgXcQ_0-5.mp4");
        for _ in 0..2 {
            let id = registry.create();
            registry.finish(&id, JobOutcome::Done { file: shared.clone() });
        }

        let eviction = registry.evict_expired(Duration::ZERO);
        assert_eq!(eviction.jobs, 2);
        assert_eq!(eviction.files, vec![shared]);
    }
}
