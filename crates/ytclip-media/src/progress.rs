//! Progress scraping from yt-dlp and ffmpeg output.
//!
//! yt-dlp reports raw download progress as bare percentages; when it hands
//! section downloads to ffmpeg, progress shows up as `time=HH:MM:SS.ms`
//! stamps relative to the requested clip. Both are coupled to the tools'
//! exact text, so all matching lives behind [`parse_progress_line`].

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use ytclip_models::ProgressEvent;

/// Callback receiving scraped progress events.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync + 'static>;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").unwrap());

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());

/// Longest output segment buffered before it is flushed as a line.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Interpret one line of tool output.
///
/// Tries the percentage pattern first, then the merge timestamp pattern.
/// `clip_duration_secs` scales merge timestamps to a fraction; lines that
/// match neither pattern yield `None`.
pub fn parse_progress_line(line: &str, clip_duration_secs: u64) -> Option<ProgressEvent> {
    if let Some(caps) = PERCENT_RE.captures(line) {
        let value: f64 = caps[1].parse().ok()?;
        let value = value.min(100.0);
        return Some(ProgressEvent::progress(
            value / 100.0,
            format!("Downloading {:.1}%", value),
        ));
    }

    if let Some(caps) = TIME_RE.captures(line) {
        if clip_duration_secs == 0 {
            return None;
        }
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        let elapsed = hours * 3600.0 + minutes * 60.0 + seconds;
        let fraction = (elapsed / clip_duration_secs as f64).min(1.0);
        return Some(ProgressEvent::progress(
            fraction,
            format!("Merging {:.1}%", fraction * 100.0),
        ));
    }

    None
}

/// Read the next output segment, splitting on `\n` or `\r`.
///
/// Both tools redraw their progress line with carriage returns, so plain
/// line reading would only see it once the stream closes. Segments longer
/// than [`MAX_LINE_BYTES`] are returned in pieces. Returns `None` at end of
/// stream.
pub async fn next_output_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if buf.is_empty() {
                return Ok(None);
            }
            return Ok(Some(String::from_utf8_lossy(buf).into_owned()));
        }

        let room = MAX_LINE_BYTES - buf.len();
        match available
            .iter()
            .take(room)
            .position(|b| *b == b'\n' || *b == b'\r')
        {
            Some(i) => {
                buf.extend_from_slice(&available[..i]);
                reader.consume(i + 1);
                return Ok(Some(String::from_utf8_lossy(buf).into_owned()));
            }
            None => {
                let n = available.len().min(room);
                buf.extend_from_slice(&available[..n]);
                reader.consume(n);
                if buf.len() >= MAX_LINE_BYTES {
                    return Ok(Some(String::from_utf8_lossy(buf).into_owned()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_percentage() {
        let event = parse_progress_line("  42.5%  of ~10MiB", 120).unwrap();
        assert!((event.pct.unwrap() - 0.425).abs() < 1e-9);
        assert_eq!(event.msg, "Downloading 42.5%");
        assert!(!event.done);
    }

    #[test]
    fn test_ytdlp_download_line() {
        let event =
            parse_progress_line("[download]  12.0% of ~  3.52MiB at  1.20MiB/s ETA 00:02", 10)
                .unwrap();
        assert!((event.pct.unwrap() - 0.12).abs() < 1e-9);
        assert_eq!(event.msg, "Downloading 12.0%");
    }

    #[test]
    fn test_merge_timestamp() {
        let event = parse_progress_line("time=00:01:30.00", 120).unwrap();
        assert!((event.pct.unwrap() - 0.75).abs() < 1e-9);
        assert_eq!(event.msg, "Merging 75.0%");
    }

    #[test]
    fn test_merge_timestamp_caps_at_one() {
        let line = "frame=  900 fps=60 q=-1.0 size=4096kB time=00:05:00.00 bitrate=N/A speed=2x";
        let event = parse_progress_line(line, 120).unwrap();
        assert_eq!(event.pct, Some(1.0));
        assert_eq!(event.msg, "Merging 100.0%");
    }

    #[test]
    fn test_unmatched_lines() {
        assert!(parse_progress_line("[youtube] dQw4w9WgXcQ: Downloading webpage", 10).is_none());
        assert!(parse_progress_line("time=N/A bitrate=N/A", 10).is_none());
        assert!(parse_progress_line("", 10).is_none());
        assert!(parse_progress_line("time=00:00:05.00", 0).is_none());
    }

    #[tokio::test]
    async fn test_next_output_line_splits_carriage_returns() {
        let data: &[u8] = b"[download]  1.0%\r[download]  2.0%\rdone\npartial";
        let mut reader = data;
        let mut buf = Vec::new();
        let mut lines = Vec::new();
        while let Some(line) = next_output_line(&mut reader, &mut buf).await.unwrap() {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec!["[download]  1.0%", "[download]  2.0%", "done", "partial"]
        );
    }

    #[tokio::test]
    async fn test_next_output_line_caps_unterminated_output() {
        let mut data = vec![b'x'; MAX_LINE_BYTES * 2 + 10];
        data.extend_from_slice(b"\n12.0%\n");
        let mut reader = data.as_slice();
        let mut buf = Vec::new();
        let mut lengths = Vec::new();
        let mut last = String::new();
        while let Some(line) = next_output_line(&mut reader, &mut buf).await.unwrap() {
            lengths.push(line.len());
            last = line;
        }
        assert_eq!(lengths, vec![MAX_LINE_BYTES, MAX_LINE_BYTES, 10, 5]);
        assert_eq!(last, "12.0%");
    }
}
