//! Timestamp computation for sampled frames.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a sampled frame's timestamp is derived from its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// `frame_index / fps`
    #[default]
    FrameTime,
    /// `frame_index * (stride / fps)`, the formula used by earlier releases.
    /// Grows with the square of the stride; kept only for output compatibility.
    StrideScaled,
}

impl TimestampPolicy {
    /// Timestamp in seconds for a frame index. Returns 0 for a non-positive fps.
    pub fn compute(&self, frame_index: u64, stride: u64, fps: f64) -> f64 {
        if fps <= 0.0 {
            return 0.0;
        }
        match self {
            TimestampPolicy::FrameTime => frame_index as f64 / fps,
            TimestampPolicy::StrideScaled => frame_index as f64 * (stride as f64 / fps),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampPolicy::FrameTime => "frame_time",
            TimestampPolicy::StrideScaled => "stride_scaled",
        }
    }
}

impl fmt::Display for TimestampPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimestampPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "frame_time" => Ok(TimestampPolicy::FrameTime),
            "stride_scaled" | "legacy" => Ok(TimestampPolicy::StrideScaled),
            other => Err(format!("unknown timestamp policy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_time() {
        let policy = TimestampPolicy::FrameTime;
        assert!((policy.compute(60, 30, 30.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stride_scaled_matches_legacy_formula() {
        let policy = TimestampPolicy::StrideScaled;
        // 60 * (30 / 30) = 60
        assert!((policy.compute(60, 30, 30.0) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_fps() {
        assert_eq!(TimestampPolicy::FrameTime.compute(10, 1, 0.0), 0.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("frame_time".parse::<TimestampPolicy>().unwrap(), TimestampPolicy::FrameTime);
        assert_eq!("Legacy".parse::<TimestampPolicy>().unwrap(), TimestampPolicy::StrideScaled);
        assert!("bogus".parse::<TimestampPolicy>().is_err());
    }
}
