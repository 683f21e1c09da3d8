//! Server-sent progress events.

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures_util::stream::{Stream, StreamExt};
use tracing::debug;

use ytclip_jobs::{relay, RelayItem};
use ytclip_models::JobId;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

/// Decrements the active stream gauge when the client goes away.
struct StreamGuard {
    job_id: JobId,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        metrics::sse_stream_closed();
        debug!(job_id = %self.job_id, "Progress stream closed");
    }
}

/// Stream a job's progress as `data: {json}` events.
///
/// Idle periods produce SSE comments. The stream ends after the terminal
/// event; an unknown job gets a single "Job not found" terminal event.
/// A second concurrent stream for the same job is rejected with 409.
pub async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let job_id = JobId::from_string(job_id);
    let items = relay(&state.registry, &job_id, state.config.sse_keepalive)?;

    metrics::sse_stream_opened();
    let guard = StreamGuard { job_id };

    let events = items.map(move |item| {
        let _ = &guard;
        to_sse_event(item)
    });

    Ok(Sse::new(events))
}

fn to_sse_event(item: RelayItem) -> Result<Event, axum::Error> {
    match item {
        RelayItem::Event(event) => Event::default().json_data(event),
        RelayItem::KeepAlive => Ok(Event::default().comment("keep-alive")),
    }
}
