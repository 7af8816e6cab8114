//! Frame labels and per-frame results.

use serde::{Deserialize, Serialize};

/// Position of a sampled frame in the original video.
///
/// Carried alongside every image through batching and dispatch so results
/// can be put back in order once requests complete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameLabel {
    /// Original 0-based frame index
    pub frame_number: u64,
    /// Timestamp in seconds
    pub timestamp: f64,
}

impl FrameLabel {
    pub fn new(frame_number: u64, timestamp: f64) -> Self {
        Self {
            frame_number,
            timestamp,
        }
    }
}

/// Analysis produced for a single sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// Original 0-based frame index
    pub frame_number: u64,
    /// Timestamp in seconds
    pub timestamp: f64,
    /// Analysis text returned by the backend
    pub result: String,
}

impl FrameResult {
    pub fn new(label: FrameLabel, result: impl Into<String>) -> Self {
        Self {
            frame_number: label.frame_number,
            timestamp: label.timestamp,
            result: result.into(),
        }
    }

    /// Parse the result as JSON, for runs that requested JSON output.
    pub fn structured(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.result).ok()
    }
}
