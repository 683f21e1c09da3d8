//! Video metadata handler.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use ytclip_media::probe_metadata;
use ytclip_models::VideoMetadata;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VideoInfoQuery {
    #[serde(default)]
    pub url: String,
}

/// Probe a URL for title, thumbnail and duration.
///
/// Never fails: any probe error yields all-null metadata.
pub async fn video_info(
    State(state): State<AppState>,
    Query(query): Query<VideoInfoQuery>,
) -> Json<VideoMetadata> {
    let url = query.url.trim();
    if url.is_empty() {
        return Json(VideoMetadata::empty());
    }
    Json(probe_metadata(&state.tools, url, state.config.probe_timeout).await)
}
