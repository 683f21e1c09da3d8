//! Relay of one job's events to a single consumer.

use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use ytclip_models::{JobId, ProgressEvent};

use crate::error::{JobError, JobResult};
use crate::registry::{JobEvents, JobRegistry, RecvOutcome, Subscription};

/// Default interval between keep-alives on an idle stream.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// Item yielded by [`relay`].
#[derive(Debug, Clone, PartialEq)]
pub enum RelayItem {
    Event(ProgressEvent),
    /// Nothing happened for one keep-alive interval
    KeepAlive,
}

/// Stream a job's events in FIFO order until its terminal event.
///
/// An unknown job yields a single "Job not found" terminal event. Fails
/// only when another consumer is already attached to the job.
pub fn relay(
    registry: &JobRegistry,
    job_id: &JobId,
    keepalive: Duration,
) -> JobResult<BoxStream<'static, RelayItem>> {
    match registry.subscribe(job_id) {
        Ok(Subscription::Live(events)) => Ok(live_stream(events, keepalive)),
        Ok(Subscription::Replay(event)) => {
            Ok(stream::once(async move { RelayItem::Event(event) }).boxed())
        }
        Err(JobError::NotFound(_)) => {
            debug!(job_id = %job_id, "Relay requested for unknown job");
            Ok(stream::once(async { RelayItem::Event(ProgressEvent::not_found()) }).boxed())
        }
        Err(e) => Err(e),
    }
}

fn live_stream(events: JobEvents, keepalive: Duration) -> BoxStream<'static, RelayItem> {
    stream::unfold(Some(events), move |state| async move {
        let mut events = state?;
        match events.recv_timeout(keepalive).await {
            RecvOutcome::Event(event) => {
                let next = if event.is_terminal() { None } else { Some(events) };
                Some((RelayItem::Event(event), next))
            }
            RecvOutcome::Idle => Some((RelayItem::KeepAlive, Some(events))),
            // Producer went away without a terminal event.
            RecvOutcome::Closed => Some((
                RelayItem::Event(ProgressEvent::failed("Job ended unexpectedly")),
                None,
            )),
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use ytclip_models::{JobOutcome, JobStatus};

    const WAIT: Duration = Duration::from_millis(20);

    fn events_of(items: &[RelayItem]) -> Vec<&ProgressEvent> {
        items
            .iter()
            .filter_map(|item| match item {
                RelayItem::Event(e) => Some(e),
                RelayItem::KeepAlive => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_job_yields_not_found() {
        let registry = JobRegistry::new();
        let items: Vec<RelayItem> = relay(&registry, &JobId::from_string("missing"), WAIT)
            .unwrap()
            .collect()
            .await;
        assert_eq!(items, vec![RelayItem::Event(ProgressEvent::not_found())]);
        match &items[0] {
            RelayItem::Event(e) => {
                assert_eq!(e.msg, "Job not found");
                assert!(e.done);
                assert!(!e.ok);
            }
            RelayItem::KeepAlive => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_relay_ends_after_terminal_event() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.emit(&id, ProgressEvent::progress(0.25, "Downloading 25.0%"));
        registry.emit(&id, ProgressEvent::complete());
        registry.finish(&id, JobOutcome::Done { file: PathBuf::from("/tmp/clip.mp4") });

        let items: Vec<RelayItem> = relay(&registry, &id, WAIT).unwrap().collect().await;
        let events = events_of(&items);
        let msgs: Vec<&str> = events.iter().map(|e| e.msg.as_str()).collect();
        assert_eq!(msgs, vec!["Downloading 25.0%", "Complete", "Done"]);
        assert_eq!(events.iter().filter(|e| e.done).count(), 1);
        assert!(events.last().unwrap().done);
    }

    #[tokio::test]
    async fn test_relay_ends_after_terminal_status_update() {
        let registry = JobRegistry::new();
        let id = registry.create();
        let mut stream = relay(&registry, &id, WAIT).unwrap();
        assert_eq!(stream.next().await, Some(RelayItem::KeepAlive));

        registry
            .update(&id, JobStatus::Done, Some(PathBuf::from("/tmp/clip.mp4")), None)
            .unwrap();
        assert!(!registry.finish(&id, JobOutcome::Done { file: PathBuf::from("/tmp/clip.mp4") }));

        let rest: Vec<RelayItem> = tokio::time::timeout(Duration::from_secs(1), stream.collect())
            .await
            .unwrap();
        assert_eq!(rest, vec![RelayItem::Event(ProgressEvent::succeeded("Done"))]);
    }

    #[tokio::test]
    async fn test_keepalive_while_idle() {
        let registry = JobRegistry::new();
        let id = registry.create();
        let mut stream = relay(&registry, &id, WAIT).unwrap();

        assert_eq!(stream.next().await, Some(RelayItem::KeepAlive));

        registry.emit(&id, ProgressEvent::progress(0.5, "Downloading 50.0%"));
        registry.finish(&id, JobOutcome::Failed { message: "Cancelled".into() });

        let rest: Vec<RelayItem> = stream.collect().await;
        let events = events_of(&rest);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].msg, "Cancelled");
        assert!(!events[1].ok);
    }

    #[tokio::test]
    async fn test_concurrent_relay_rejected_and_resumed_after_drop() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.emit(&id, ProgressEvent::status("Starting"));

        let first = relay(&registry, &id, WAIT).unwrap();
        assert!(matches!(
            relay(&registry, &id, WAIT),
            Err(JobError::AlreadySubscribed(_))
        ));
        drop(first);

        registry.finish(&id, JobOutcome::Done { file: PathBuf::from("/tmp/clip.mp4") });
        let items: Vec<RelayItem> = relay(&registry, &id, WAIT).unwrap().collect().await;
        let msgs: Vec<&str> = events_of(&items).iter().map(|e| e.msg.as_str()).collect();
        assert_eq!(msgs, vec!["Starting", "Done"]);
    }

    #[tokio::test]
    async fn test_replay_for_drained_job() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.finish(&id, JobOutcome::Done { file: PathBuf::from("/tmp/clip.mp4") });

        let _: Vec<RelayItem> = relay(&registry, &id, WAIT).unwrap().collect().await;
        let again: Vec<RelayItem> = relay(&registry, &id, WAIT).unwrap().collect().await;
        assert_eq!(again, vec![RelayItem::Event(ProgressEvent::succeeded("Done"))]);
    }
}
