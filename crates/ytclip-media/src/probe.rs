//! Metadata-only probe via `yt-dlp --dump-json`.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use ytclip_models::{extract_video_id, fallback_thumbnail_url, VideoMetadata};

use crate::command::ToolEnv;
use crate::error::{MediaError, MediaResult};

/// Fields we read from yt-dlp's info JSON.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
}

/// Probe a URL for title, thumbnail and duration without downloading.
///
/// Degrades to all-null metadata on any failure (missing tool, timeout,
/// non-zero exit, unparsable output).
pub async fn probe_metadata(env: &ToolEnv, url: &str, timeout: Duration) -> VideoMetadata {
    match try_probe(env, url, timeout).await {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(url = %url, "Metadata probe failed: {}", e);
            VideoMetadata::empty()
        }
    }
}

async fn try_probe(env: &ToolEnv, url: &str, timeout: Duration) -> MediaResult<VideoMetadata> {
    let program = env.resolve_ytdlp()?;

    let mut cmd = env.command(&program);
    cmd.args(probe_args(url));

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| MediaError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        return Err(MediaError::probe_failed(format!(
            "yt-dlp exited with {:?}",
            output.status.code()
        )));
    }

    let info: YtDlpInfo = serde_json::from_slice(&output.stdout)?;
    Ok(metadata_from_info(info, url))
}

fn probe_args(url: &str) -> [&str; 7] {
    [
        "--dump-json",
        "--skip-download",
        "--no-playlist",
        "--no-warnings",
        "--force-ipv4",
        "--",
        url,
    ]
}

fn metadata_from_info(info: YtDlpInfo, url: &str) -> VideoMetadata {
    let thumbnail = info
        .thumbnail
        .filter(|t| !t.is_empty())
        .or_else(|| {
            extract_video_id(url)
                .ok()
                .or(info.id)
                .map(|id| fallback_thumbnail_url(&id))
        });

    VideoMetadata {
        title: info.title,
        thumbnail,
        duration: info.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_info() {
        let info: YtDlpInfo = serde_json::from_str(
            r#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","thumbnail":"https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg","duration":212.0,"uploader":"x"}"#,
        )
        .unwrap();
        let meta = metadata_from_info(info, "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(meta.title.as_deref(), Some("Never Gonna Give You Up"));
        assert_eq!(
            meta.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
        );
        assert_eq!(meta.duration, Some(212));
    }

    #[test]
    fn test_probe_url_follows_separator() {
        let args = probe_args("--exec=touch /tmp/x");
        assert_eq!(args[5], "--");
        assert_eq!(args[6], "--exec=touch /tmp/x");
    }

    #[test]
    fn test_thumbnail_falls_back_to_cdn() {
        let info: YtDlpInfo =
            serde_json::from_str(r#"{"title":"t","duration":10.4}"#).unwrap();
        let meta = metadata_from_info(info, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(
            meta.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
        assert_eq!(meta.duration, Some(10));
    }

    #[tokio::test]
    async fn test_probe_without_tool_is_all_null() {
        let env = ToolEnv::new().with_ytdlp_bin("definitely-not-a-real-yt-dlp-binary");
        let meta = probe_metadata(&env, "https://youtu.be/dQw4w9WgXcQ", Duration::from_secs(1)).await;
        assert_eq!(meta, VideoMetadata::empty());
    }
}
