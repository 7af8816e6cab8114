//! Structured run logging utilities.
//!
//! Every top-level invocation gets a random run id so interleaved log lines
//! from concurrent requests can be tied back to one analysis.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Run logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// Create a logger with a fresh run id.
    ///
    /// # Arguments
    /// * `operation` - The kind of run (e.g., "analyze_video", "analyze_images")
    pub fn new(operation: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
        }
    }

    /// Create a logger for an existing run id.
    pub fn with_run_id(run_id: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunLogger::new("analyze_video");
        let b = RunLogger::new("analyze_video");

        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.operation(), "analyze_video");
        assert!(Uuid::parse_str(a.run_id()).is_ok());
    }

    #[test]
    fn test_with_run_id() {
        let logger = RunLogger::with_run_id("run-123", "analyze_images");

        assert_eq!(logger.run_id(), "run-123");
        assert_eq!(logger.operation(), "analyze_images");
    }
}
