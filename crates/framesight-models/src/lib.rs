//! Shared data models for FrameSight.
//!
//! This crate provides Serde-serializable types for:
//! - Video container metadata
//! - Frame labels and per-frame analysis results
//! - Encoded image payloads handed to the vision backend
//! - Analysis request templates, output formats and batch modes
//! - Timestamp computation policies

pub mod analysis;
pub mod frame;
pub mod image;
pub mod timestamp;
pub mod video;

// Re-export common types
pub use analysis::{
    AnalysisTemplate, BatchMode, OutputFormat, ParseOutputFormatError, DEFAULT_MAX_TOKENS,
};
pub use frame::{FrameLabel, FrameResult};
pub use image::NormalizedImage;
pub use timestamp::TimestampPolicy;
pub use video::VideoMetadata;
