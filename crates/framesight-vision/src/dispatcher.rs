//! The boundary between the pipeline and the vision backend.

use async_trait::async_trait;
use futures::stream::{BoxStream, TryStreamExt};

use framesight_models::{AnalysisTemplate, NormalizedImage, OutputFormat, DEFAULT_MAX_TOKENS};

use crate::error::VisionResult;

/// One analysis call: images plus the text and options that go with them.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub images: Vec<NormalizedImage>,
    pub prompt: String,
    pub output_format: OutputFormat,
    pub stream: bool,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub prefill: Option<String>,
}

impl AnalysisRequest {
    pub fn new(images: Vec<NormalizedImage>, prompt: impl Into<String>) -> Self {
        Self {
            images,
            prompt: prompt.into(),
            output_format: OutputFormat::Text,
            stream: false,
            system: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            prefill: None,
        }
    }

    /// Build a request carrying the template's options.
    pub fn from_template(
        images: Vec<NormalizedImage>,
        prompt: impl Into<String>,
        template: &AnalysisTemplate,
    ) -> Self {
        Self {
            images,
            prompt: prompt.into(),
            output_format: template.output_format,
            stream: template.stream,
            system: template.system.clone(),
            max_tokens: template.max_tokens,
            prefill: template.prefill.clone(),
        }
    }
}

/// What the backend returned.
pub enum AnalysisOutput {
    /// The full answer
    Complete(String),
    /// Text chunks in arrival order
    Stream(BoxStream<'static, VisionResult<String>>),
}

impl AnalysisOutput {
    /// Drain into one string. A stream error fails the whole output.
    pub async fn collect_text(self) -> VisionResult<String> {
        match self {
            AnalysisOutput::Complete(text) => Ok(text),
            AnalysisOutput::Stream(stream) => {
                stream
                    .try_fold(String::new(), |mut acc, chunk| async move {
                        acc.push_str(&chunk);
                        Ok(acc)
                    })
                    .await
            }
        }
    }
}

impl std::fmt::Debug for AnalysisOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisOutput::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            AnalysisOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Performs analysis calls.
#[async_trait]
pub trait AnalysisDispatcher: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> VisionResult<AnalysisOutput>;
}
