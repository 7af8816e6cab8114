//! Video metadata models.

use serde::{Deserialize, Serialize};

/// Container-level information about a video, computed once when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Frame rate (frames/second)
    pub fps: f64,
    /// Total number of frames in the stream
    pub frame_count: u64,
    /// Duration in seconds, derived from `frame_count / fps`
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Presentation time of the first frame, in seconds
    #[serde(default)]
    pub start_time: f64,
}

impl VideoMetadata {
    /// Build metadata, deriving the duration from frame count and rate.
    pub fn new(fps: f64, frame_count: u64, width: u32, height: u32) -> Self {
        let duration = if fps > 0.0 {
            frame_count as f64 / fps
        } else {
            0.0
        };

        Self {
            fps,
            frame_count,
            duration,
            width,
            height,
            start_time: 0.0,
        }
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    /// Source frame index shown at presentation time `pts_time`.
    ///
    /// `None` when the rate is unknown or the time is not a number.
    pub fn frame_index_at(&self, pts_time: f64) -> Option<u64> {
        if self.fps <= 0.0 || !pts_time.is_finite() {
            return None;
        }
        Some(((pts_time - self.start_time) * self.fps).round().max(0.0) as u64)
    }

    /// Size in bytes of one packed 24-bit RGB frame.
    pub fn rgb_frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Number of frames a sampler with the given stride will visit.
    pub fn sampled_positions(&self, stride: u64) -> u64 {
        if stride == 0 {
            return 0;
        }
        self.frame_count.div_ceil(stride)
    }
}
