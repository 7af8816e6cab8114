//! FFmpeg command builder for raw frame decoding.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Builder for an FFmpeg invocation that writes decoded frames to stdout.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Video filters, joined with ','
    filters: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command reading from `input`.
    pub fn new(input: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            filters: Vec::new(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Append a video filter to the chain.
    pub fn video_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Keep only frames whose decode index is a multiple of `stride`.
    pub fn select_every(self, stride: u64) -> Self {
        self.video_filter(format!("select=not(mod(n\\,{}))", stride))
    }

    /// Keep frames whose source position, derived from the presentation
    /// time, is a multiple of `stride`. Frames the decoder drops do not
    /// shift the positions of later frames.
    pub fn select_every_at(self, stride: u64, fps: f64, start_time: f64) -> Self {
        self.video_filter(format!(
            "select=eq(mod(round((t-({:.6}))*{:.6})\\,{})\\,0)",
            start_time, fps, stride
        ))
    }

    /// Log every frame leaving the filter chain (requires `info` log level).
    pub fn show_frame_info(self) -> Self {
        self.video_filter("showinfo")
    }

    /// Emit selected frames as-is instead of duplicating or dropping to a fixed rate.
    pub fn passthrough_timing(self) -> Self {
        self.output_arg("-vsync").output_arg("0")
    }

    /// Set output pixel format.
    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Write headerless raw frames.
    pub fn raw_video(self) -> Self {
        self.output_arg("-f").output_arg("rawvideo")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
            "-nostats".to_string(),
        ];

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        if !self.filters.is_empty() {
            args.push("-vf".to_string());
            args.push(self.filters.join(","));
        }

        args.extend(self.output_args.iter().cloned());

        // Frames go to stdout
        args.push("pipe:1".to_string());

        args
    }

    /// Spawn FFmpeg with stdout piped.
    ///
    /// The child is killed when dropped, so an early return from the caller
    /// never leaves a decoder running.
    pub fn spawn(&self) -> MediaResult<Child> {
        check_ffmpeg()?;

        let args = self.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None))
    }
}

/// Presentation time from a `showinfo` frame line, e.g.
/// `[Parsed_showinfo_1 @ 0x5581] n:   2 pts: 122880 pts_time:4 duration:...`.
pub fn showinfo_pts_time(line: &str) -> Option<f64> {
    if !line.contains("Parsed_showinfo") || !line.contains(" n:") {
        return None;
    }
    let rest = &line[line.find("pts_time:")? + "pts_time:".len()..];
    rest.split_whitespace().next()?.parse().ok()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4")
            .select_every(30)
            .passthrough_timing()
            .pixel_format("rgb24")
            .raw_video();

        let args = cmd.build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "select=not(mod(n\\,30))");
        assert!(args.contains(&"rgb24".to_string()));
        assert!(args.contains(&"rawvideo".to_string()));
        assert_eq!(args.last().unwrap(), "pipe:1");

        // Input comes before filters
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "input.mp4");
        assert!(input < vf);
    }

    #[test]
    fn test_filters_are_chained() {
        let args = FfmpegCommand::new("in.mkv")
            .select_every(2)
            .video_filter("setsar=1")
            .log_level("warning")
            .build_args();
        assert!(args.contains(&"select=not(mod(n\\,2)),setsar=1".to_string()));
        assert_eq!(args[3], "warning");
        assert!(args.contains(&"-nostats".to_string()));
    }

    #[test]
    fn test_time_based_selection() {
        let args = FfmpegCommand::new("in.mp4")
            .select_every_at(30, 29.97, -0.033)
            .show_frame_info()
            .build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[vf + 1],
            "select=eq(mod(round((t-(-0.033000))*29.970000)\\,30)\\,0),showinfo"
        );
    }

    #[test]
    fn test_showinfo_pts_time() {
        let line = "[Parsed_showinfo_1 @ 0x55d5c2a4f2c0] n:   2 pts: 122880 pts_time:4       duration:512 fmt:rgb24";
        assert_eq!(showinfo_pts_time(line), Some(4.0));

        let line = "[Parsed_showinfo_1 @ 0x55d5c2a4f2c0] n:   0 pts:      0 pts_time:0.033367 pos: 48 fmt:yuv420p";
        assert_eq!(showinfo_pts_time(line), Some(0.033367));

        // Per-frame detail lines and unrelated output carry no timestamp
        assert_eq!(
            showinfo_pts_time("[Parsed_showinfo_1 @ 0x55d5c2a4f2c0]   color_range:tv color_space:bt709"),
            None
        );
        assert_eq!(showinfo_pts_time("Stream mapping:"), None);
        assert_eq!(showinfo_pts_time("[Parsed_showinfo_1 @ 0x1] n:   3 pts:NOPTS pts_time:NOPTS"), None);
    }
}
