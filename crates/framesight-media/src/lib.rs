#![deny(unreachable_patterns)]
//! FFmpeg-backed frame sampling and image normalization.
//!
//! This crate provides:
//! - Video probing via FFprobe
//! - Type-safe FFmpeg command building for raw frame decoding
//! - Stride-based frame sampling on a scoped worker pool
//! - Image normalization (resize, PNG encode, token estimate)
//! - Image source ingestion for standalone image analysis

pub mod command;
pub mod error;
pub mod normalize;
pub mod probe;
pub mod sampler;
pub mod source;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use error::{MediaError, MediaResult};
pub use normalize::{estimate_image_tokens, ImageNormalizer, DEFAULT_MAX_IMAGE_SIZE};
pub use probe::probe_video;
pub use sampler::{FrameSampler, SampledFrame};
pub use source::{is_video_file, normalize_sources, ImageSource, MAX_IMAGES};
