//! FFprobe video information.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use framesight_models::VideoMetadata;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    start_time: Option<String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
    tags: Option<FfprobeTags>,
}

/// Display matrix entries carry `rotation`; other side data is ignored.
#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

impl FfprobeStream {
    /// Display rotation in degrees, normalized to `0..360`.
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .map(|degrees| (degrees.round() as i64).rem_euclid(360))
            .unwrap_or(0)
    }
}

/// Probe a video file for container metadata.
///
/// Any failure to read the container is reported as [`MediaError::VideoOpen`].
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoMetadata> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::video_open(path, "file not found"));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::video_open(
            path,
            format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    let report: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| MediaError::video_open(path, format!("unreadable ffprobe output: {}", e)))?;

    let metadata = metadata_from_report(&report)
        .ok_or_else(|| MediaError::video_open(path, "no video stream found"))?;

    debug!(
        path = %path.display(),
        fps = metadata.fps,
        start_time = metadata.start_time,
        frames = metadata.frame_count,
        width = metadata.width,
        height = metadata.height,
        "Probed video"
    );

    Ok(metadata)
}

/// Build metadata from parsed ffprobe output. `None` when there is no video stream.
///
/// Width and height are the displayed size: FFmpeg applies the stream's
/// rotation while decoding, so a quarter-turn swaps the coded dimensions.
fn metadata_from_report(report: &FfprobeOutput) -> Option<VideoMetadata> {
    let video_stream = report.streams.iter().find(|s| s.codec_type == "video")?;

    // Parse frame rate
    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let frame_count = video_stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or_else(|| {
            let duration = video_stream
                .duration
                .as_deref()
                .or(report.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0);
            (duration * fps).round().max(0.0) as u64
        });

    let start_time = video_stream
        .start_time
        .as_deref()
        .or(report.format.as_ref().and_then(|f| f.start_time.as_deref()))
        .and_then(|t| t.parse::<f64>().ok())
        .filter(|t| t.is_finite())
        .unwrap_or(0.0);

    let coded_width = video_stream.width.unwrap_or(0);
    let coded_height = video_stream.height.unwrap_or(0);
    let (width, height) = match video_stream.rotation() {
        90 | 270 => (coded_height, coded_width),
        _ => (coded_width, coded_height),
    };

    Some(VideoMetadata::new(fps, frame_count, width, height).with_start_time(start_time))
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}
