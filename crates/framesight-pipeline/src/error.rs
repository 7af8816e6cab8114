//! Pipeline error types.

use thiserror::Error;

use framesight_media::MediaError;
use framesight_vision::VisionError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Stage of the pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Config,
    Request,
    Probe,
    Sampling,
    Normalization,
    Analysis,
    Assembly,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Config => "config",
            PipelineStage::Request => "request",
            PipelineStage::Probe => "probe",
            PipelineStage::Sampling => "sampling",
            PipelineStage::Normalization => "normalization",
            PipelineStage::Analysis => "analysis",
            PipelineStage::Assembly => "assembly",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Analysis failed for frames {first_frame}-{last_frame}: {source}")]
    Dispatch {
        first_frame: u64,
        last_frame: u64,
        #[source]
        source: VisionError,
    },

    #[error("Analysis failed: {0}")]
    Analysis(#[from] VisionError),

    #[error("Result assembly failed: {0}")]
    Assembly(String),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }

    pub fn dispatch(first_frame: u64, last_frame: u64, source: VisionError) -> Self {
        Self::Dispatch {
            first_frame,
            last_frame,
            source,
        }
    }

    /// Which stage failed.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Config(_) => PipelineStage::Config,
            PipelineError::InvalidRequest(_) => PipelineStage::Request,
            PipelineError::Media(e) if e.is_video_open() => PipelineStage::Probe,
            PipelineError::Media(MediaError::FfprobeNotFound) => PipelineStage::Probe,
            PipelineError::Media(e) if e.is_image_processing() => PipelineStage::Normalization,
            PipelineError::Media(_) => PipelineStage::Sampling,
            PipelineError::Dispatch { .. } | PipelineError::Analysis(_) => PipelineStage::Analysis,
            PipelineError::Assembly(_) => PipelineStage::Assembly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        let err = PipelineError::from(MediaError::video_open("/tmp/x.mp4", "moov atom not found"));
        assert_eq!(err.stage(), PipelineStage::Probe);

        let err = PipelineError::from(MediaError::image_processing("zero dimension"));
        assert_eq!(err.stage(), PipelineStage::Normalization);

        let err = PipelineError::from(MediaError::FfmpegNotFound);
        assert_eq!(err.stage(), PipelineStage::Sampling);

        let err = PipelineError::dispatch(0, 30, VisionError::Api("boom".into()));
        assert_eq!(err.stage(), PipelineStage::Analysis);
        assert!(err.to_string().contains("frames 0-30"));
    }

    #[test]
    fn test_dispatch_keeps_source() {
        use std::error::Error as _;

        let err = PipelineError::dispatch(60, 60, VisionError::RateLimited("slow down".into()));
        let source = err.source().unwrap();
        assert!(source.to_string().contains("slow down"));
    }
}
