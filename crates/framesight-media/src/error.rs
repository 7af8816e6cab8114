//! Error types for media operations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing, decoding or normalizing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    /// The container cannot be opened or read at all.
    #[error("Cannot open video {path}: {reason}")]
    VideoOpen { path: PathBuf, reason: String },

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// A decoded frame or loaded image could not be normalized.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Failed to fetch image from {url}: {message}")]
    ImageFetch { url: String, message: String },

    #[error("Too many images: maximum allowed is {max}, but {provided} were provided")]
    TooManyImages { max: usize, provided: usize },

    #[error("Frame worker pool failed: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a video open error.
    pub fn video_open(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::VideoOpen {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create an image processing error.
    pub fn image_processing(message: impl Into<String>) -> Self {
        Self::ImageProcessing(message.into())
    }

    /// Create an image fetch error.
    pub fn image_fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ImageFetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a worker pool error.
    pub fn worker_pool(message: impl Into<String>) -> Self {
        Self::WorkerPool(message.into())
    }

    /// Whether this error means the container itself was unreadable.
    pub fn is_video_open(&self) -> bool {
        matches!(self, MediaError::VideoOpen { .. })
    }

    /// Whether this error came from normalizing an image.
    pub fn is_image_processing(&self) -> bool {
        matches!(
            self,
            MediaError::ImageProcessing(_)
                | MediaError::ImageFetch { .. }
                | MediaError::TooManyImages { .. }
        )
    }
}

impl From<image::ImageError> for MediaError {
    fn from(e: image::ImageError) -> Self {
        MediaError::ImageProcessing(e.to_string())
    }
}
