//! Frame sampling and batched vision analysis.
//!
//! This crate ties the pieces together:
//! - Sample frames from a video at a fixed stride
//! - Normalize each frame for the vision backend
//! - Dispatch frames in grouped or independent batches
//! - Reassemble per-frame results in frame order
//! - Run standalone image tasks (describe, judge, evolution, alt-text, ...)

pub mod analyzer;
pub mod assembler;
pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod prompt;
pub mod retry;
pub mod task;

#[cfg(test)]
mod test_support;

pub use analyzer::{VideoAnalysis, VideoAnalyzer};
pub use assembler::assemble;
pub use batch::{partition, Batch, BatchOrchestrator, LabeledOutput, PreparedFrame};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, PipelineStage};
pub use logging::RunLogger;
pub use retry::{retry_async, RetryConfig, RetryingDispatcher};
pub use task::ImageTask;
