//! Pipeline configuration.

use std::time::Duration;

use framesight_media::{DEFAULT_MAX_IMAGE_SIZE, MAX_IMAGES};
use framesight_models::{BatchMode, TimestampPolicy, DEFAULT_MAX_TOKENS};

use crate::error::{PipelineError, PipelineResult};
use crate::retry::RetryConfig;

/// Default number of frames between samples.
pub const DEFAULT_FRAME_STRIDE: u64 = 30;

/// Default batch size; the backend caps images per request at this count.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frames between two sampled frames
    pub frame_stride: u64,
    /// Decode workers (None = number of cores)
    pub workers: Option<usize>,
    /// Frames per batch
    pub batch_size: usize,
    /// Grouped or independent dispatch
    pub batch_mode: BatchMode,
    /// How sampled frame timestamps are computed
    pub timestamp_policy: TimestampPolicy,
    /// Largest width and height sent to the backend
    pub max_image_size: u32,
    /// Default response budget per request
    pub max_tokens: u32,
    /// Retries for retryable backend errors (0 = fail on first error)
    pub dispatch_retries: u32,
    /// Base delay for retry backoff
    pub retry_base_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_stride: DEFAULT_FRAME_STRIDE,
            workers: None,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_mode: BatchMode::Independent,
            timestamp_policy: TimestampPolicy::FrameTime,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            max_tokens: DEFAULT_MAX_TOKENS,
            dispatch_retries: 0,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            frame_stride: std::env::var("FRAMESIGHT_FRAME_STRIDE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FRAME_STRIDE),
            workers: std::env::var("FRAMESIGHT_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok()),
            batch_size: std::env::var("FRAMESIGHT_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE),
            batch_mode: BatchMode::from_group_flag(
                std::env::var("FRAMESIGHT_GROUP")
                    .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            ),
            timestamp_policy: std::env::var("FRAMESIGHT_TIMESTAMP_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            max_image_size: std::env::var("FRAMESIGHT_MAX_IMAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_IMAGE_SIZE),
            max_tokens: std::env::var("FRAMESIGHT_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_TOKENS),
            dispatch_retries: std::env::var("FRAMESIGHT_DISPATCH_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            retry_base_delay: Duration::from_millis(
                std::env::var("FRAMESIGHT_RETRY_BASE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.frame_stride == 0 {
            return Err(PipelineError::config("frame stride must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch size must be at least 1"));
        }
        if self.batch_mode == BatchMode::Grouped && self.batch_size > MAX_IMAGES {
            return Err(PipelineError::config(format!(
                "grouped batches carry at most {} images, got batch size {}",
                MAX_IMAGES, self.batch_size
            )));
        }
        if self.workers == Some(0) {
            return Err(PipelineError::config("worker count must be at least 1"));
        }
        if self.max_image_size == 0 {
            return Err(PipelineError::config("max image size must be at least 1"));
        }
        Ok(())
    }

    /// Retry policy for backend calls.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new("vision_request")
            .with_max_retries(self.dispatch_retries)
            .with_base_delay(self.retry_base_delay)
    }
}
