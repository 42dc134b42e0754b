//! Representative frame sampling for video items via ffmpeg.
//!
//! The sample point is the middle of the clip, capped at
//! `VideoConfig::max_sample_secs`. Duration comes from ffprobe; the frame is
//! captured by ffmpeg as a PNG on stdout.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use lens_types::{MediaItem, VideoConfig};

use crate::error::EmbeddingError;
use crate::frames::ExtractedFrame;
use crate::model::StillImage;

/// Seconds into a clip to sample: `min(duration / 2, max_secs)`.
///
/// Unknown, zero or negative durations sample the first frame.
pub fn sample_time(duration_secs: f64, max_secs: f64) -> f64 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0.0;
    }
    (duration_secs / 2.0).min(max_secs.max(0.0))
}

/// Reference to a sampled frame, stored alongside the embedding.
pub fn frame_ref(path: &str, seconds: f64) -> String {
    format!("{}#t={:.3}", path, seconds)
}

/// Where ffmpeg reads the clip from.
enum VideoInput<'a> {
    File(&'a Path),
    Stdin(Arc<[u8]>),
}

impl VideoInput<'_> {
    fn arg(&self) -> String {
        match self {
            VideoInput::File(p) => p.to_string_lossy().to_string(),
            VideoInput::Stdin(_) => "pipe:0".to_string(),
        }
    }

    fn stdin(&self) -> Option<Arc<[u8]>> {
        match self {
            VideoInput::File(_) => None,
            VideoInput::Stdin(bytes) => Some(Arc::clone(bytes)),
        }
    }
}

/// Samples a single still from a video with ffprobe + ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct VideoSampler {
    config: VideoConfig,
}

impl VideoSampler {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    /// Capture the representative frame of a video item.
    pub async fn sample(&self, item: &MediaItem) -> Result<ExtractedFrame, EmbeddingError> {
        // File-backed clips are read by ffmpeg directly; in-memory clips are
        // acquired for the duration of the two tool runs and piped in.
        let handle;
        let input = match item.file_path() {
            Some(path) => VideoInput::File(path),
            None => {
                handle = item
                    .open()
                    .map_err(|e| EmbeddingError::frame(&item.path, e))?;
                VideoInput::Stdin(Arc::from(handle.bytes()))
            }
        };

        let duration = self.probe_duration(item, &input).await?;
        let at = sample_time(duration, self.config.max_sample_secs);
        debug!(path = %item.path, duration, at, "Sampling video frame");

        let png = self.grab_frame(item, &input, at).await?;
        let image = StillImage::decode(&png).map_err(|e| EmbeddingError::frame(&item.path, e))?;

        Ok(ExtractedFrame {
            image,
            frame_ref: frame_ref(&item.path, at),
        })
    }

    async fn probe_duration(
        &self,
        item: &MediaItem,
        input: &VideoInput<'_>,
    ) -> Result<f64, EmbeddingError> {
        let args = [
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            input.arg(),
        ];
        let stdout = run_tool(&self.config.ffprobe_path, &args, input.stdin())
            .await
            .map_err(|reason| EmbeddingError::frame(&item.path, reason))?;

        parse_duration(&String::from_utf8_lossy(&stdout))
            .map_err(|reason| EmbeddingError::frame(&item.path, reason))
    }

    async fn grab_frame(
        &self,
        item: &MediaItem,
        input: &VideoInput<'_>,
        at: f64,
    ) -> Result<Vec<u8>, EmbeddingError> {
        let args = [
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.3}", at),
            "-i".to_string(),
            input.arg(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "png".to_string(),
            "pipe:1".to_string(),
        ];
        let stdout = run_tool(&self.config.ffmpeg_path, &args, input.stdin())
            .await
            .map_err(|reason| EmbeddingError::frame(&item.path, reason))?;

        if stdout.is_empty() {
            return Err(EmbeddingError::frame(&item.path, "ffmpeg produced no frame"));
        }
        Ok(stdout)
    }
}

/// ffprobe prints a float, or `N/A` when the container has no duration.
fn parse_duration(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "N/A" {
        return Ok(0.0);
    }
    trimmed
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("unparsable duration {:?}: {}", trimmed, e))
}

/// Run an external tool and collect stdout. Errors are human-readable reasons.
async fn run_tool(
    program: &str,
    args: &[String],
    stdin: Option<Arc<[u8]>>,
) -> Result<Vec<u8>, String> {
    trace!(program, ?args, "Running media tool");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to start {}: {}", program, e))?;

    let writer = match (stdin, child.stdin.take()) {
        (Some(bytes), Some(mut pipe)) => Some(tokio::spawn(async move {
            // The tool may stop reading early; a broken pipe is not an error
            let _ = pipe.write_all(&bytes).await;
            let _ = pipe.shutdown().await;
        })),
        _ => None,
    };

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("{} did not complete: {}", program, e))?;

    if let Some(writer) = writer {
        let _ = writer.await;
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        ));
    }
    Ok(output.stdout)
}
