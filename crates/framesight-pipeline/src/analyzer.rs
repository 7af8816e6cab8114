//! Video and image analysis entry points.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use framesight_media::{normalize_sources, probe_video, FrameSampler, ImageNormalizer, ImageSource};
use framesight_models::{AnalysisTemplate, FrameResult, VideoMetadata};
use framesight_vision::{AnalysisDispatcher, AnalysisOutput, AnalysisRequest};

use crate::assembler::assemble;
use crate::batch::{BatchOrchestrator, PreparedFrame};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::logging::RunLogger;
use crate::retry::RetryingDispatcher;
use crate::task::ImageTask;

/// Metadata of the analyzed video and one result per sampled frame.
#[derive(Debug, Clone, Serialize)]
pub struct VideoAnalysis {
    pub metadata: VideoMetadata,
    pub frames: Vec<FrameResult>,
}

/// Runs the sampling and analysis pipeline against a dispatcher.
pub struct VideoAnalyzer {
    config: PipelineConfig,
    dispatcher: Arc<dyn AnalysisDispatcher>,
    http: reqwest::Client,
}

impl VideoAnalyzer {
    /// Create an analyzer. Retryable backend errors are retried when the
    /// config asks for retries.
    pub fn new(config: PipelineConfig, dispatcher: Arc<dyn AnalysisDispatcher>) -> PipelineResult<Self> {
        config.validate()?;

        let dispatcher: Arc<dyn AnalysisDispatcher> = if config.dispatch_retries > 0 {
            Arc::new(RetryingDispatcher::new(dispatcher, config.retry_config()))
        } else {
            dispatcher
        };

        Ok(Self {
            config,
            dispatcher,
            http: reqwest::Client::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn normalizer(&self) -> ImageNormalizer {
        ImageNormalizer::new(self.config.max_image_size, self.config.max_image_size)
    }

    /// Sample, normalize and analyze a video.
    pub async fn analyze_video(
        &self,
        video_path: impl AsRef<Path>,
        template: &AnalysisTemplate,
    ) -> PipelineResult<VideoAnalysis> {
        let video_path = video_path.as_ref();
        let logger = RunLogger::new("analyze_video");
        let span = logger.create_span();

        async {
            logger.log_start(&video_path.display().to_string());

            let result = self.run_video(video_path, template, &logger).await;
            match &result {
                Ok(analysis) => {
                    logger.log_completion(&format!("{} frames analyzed", analysis.frames.len()))
                }
                Err(e) => logger.log_error(&format!("{} stage: {}", e.stage(), e)),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_video(
        &self,
        video_path: &Path,
        template: &AnalysisTemplate,
        logger: &RunLogger,
    ) -> PipelineResult<VideoAnalysis> {
        let metadata = probe_video(video_path).await?;
        logger.log_progress(&format!(
            "{}x{} at {:.2} fps, {} frames",
            metadata.width, metadata.height, metadata.fps, metadata.frame_count
        ));

        let sampler = FrameSampler::new(self.config.frame_stride)
            .with_workers(self.config.workers)
            .with_timestamp_policy(self.config.timestamp_policy);
        let normalizer = self.normalizer();

        let prepared = sampler
            .sample_with(video_path, &metadata, move |frame| {
                let label = frame.label();
                let image = normalizer.normalize_rgb(frame.image)?;
                Ok(PreparedFrame { label, image })
            })
            .await?;

        let expected = metadata.sampled_positions(sampler.stride());
        if (prepared.len() as u64) < expected {
            logger.log_warning(&format!(
                "decoded {} of {} sampled positions",
                prepared.len(),
                expected
            ));
        } else {
            logger.log_progress(&format!("sampled {} frames", prepared.len()));
        }

        let frames = self.analyze_frames(prepared, template).await?;
        Ok(VideoAnalysis { metadata, frames })
    }

    /// Analyze frames that are already normalized and labeled.
    pub async fn analyze_frames(
        &self,
        frames: Vec<PreparedFrame>,
        template: &AnalysisTemplate,
    ) -> PipelineResult<Vec<FrameResult>> {
        let expected = frames.len();
        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&self.dispatcher),
            self.config.batch_size,
            self.config.batch_mode,
        );

        let outputs = orchestrator.run(frames, template).await?;
        assemble(outputs, expected)
    }

    /// Describe standalone images in one request.
    ///
    /// A streamed answer is returned undrained so the caller can print it as
    /// it arrives.
    pub async fn analyze_images(
        &self,
        sources: Vec<ImageSource>,
        template: &AnalysisTemplate,
    ) -> PipelineResult<AnalysisOutput> {
        self.analyze_task(sources, &ImageTask::Describe, template).await
    }

    /// Run an image task (judge, evolution, alt-text, ...) in one request.
    ///
    /// Task arguments are checked against the image count before anything
    /// is loaded.
    pub async fn analyze_task(
        &self,
        sources: Vec<ImageSource>,
        task: &ImageTask,
        template: &AnalysisTemplate,
    ) -> PipelineResult<AnalysisOutput> {
        let logger = RunLogger::new(task.analysis_type());
        let span = logger.create_span();

        async {
            logger.log_start(&format!("{} images", sources.len()));

            let result = self.run_images(sources, task, template, &logger).await;
            match &result {
                Ok(_) => logger.log_completion("response received"),
                Err(e) => logger.log_error(&format!("{} stage: {}", e.stage(), e)),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_images(
        &self,
        sources: Vec<ImageSource>,
        task: &ImageTask,
        template: &AnalysisTemplate,
        logger: &RunLogger,
    ) -> PipelineResult<AnalysisOutput> {
        task.validate(sources.len())?;

        let images = normalize_sources(sources, &self.normalizer(), &self.http).await?;
        let tokens: u64 = images.iter().map(|i| i.estimated_tokens).sum();
        logger.log_progress(&format!("estimated {} image tokens", tokens));

        let mut template = template.clone();
        if let Some(system) = task.system_prompt() {
            template.system = Some(system);
        }
        let request = AnalysisRequest::from_template(images, task.prompt(&template), &template);
        let output = self.dispatcher.analyze(request).await?;
        Ok(output)
    }
}
