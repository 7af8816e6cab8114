//! Batch orchestration.
//!
//! Normalized frames are cut into contiguous batches and sent to the
//! dispatcher. In grouped mode each batch is one request whose answer every
//! frame of the batch shares. In independent mode every frame is its own
//! request and the batch size bounds how many are in flight at once.
//!
//! All requests run as futures on the calling task. They complete in any
//! order, so each output carries the labels of the frames it answers and the
//! assembler restores order afterwards. The first failure drops every other
//! pending request and fails the run.

use std::sync::Arc;

use futures::stream::{self, FuturesUnordered, StreamExt, TryStreamExt};
use tracing::{debug, info};

use framesight_models::{AnalysisTemplate, BatchMode, FrameLabel, NormalizedImage};
use framesight_vision::{AnalysisDispatcher, AnalysisRequest, VisionResult};

use crate::error::{PipelineError, PipelineResult};
use crate::prompt::{frame_prompt, group_prompt};

/// A normalized frame with its position in the video.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub label: FrameLabel,
    pub image: NormalizedImage,
}

/// A contiguous run of prepared frames.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Index of the first frame in the prepared sequence
    pub start: usize,
    pub labels: Vec<FrameLabel>,
    pub images: Vec<NormalizedImage>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn first_frame(&self) -> u64 {
        self.labels.first().map_or(0, |l| l.frame_number)
    }

    pub fn last_frame(&self) -> u64 {
        self.labels.last().map_or(0, |l| l.frame_number)
    }

    pub fn into_frames(self) -> impl Iterator<Item = PreparedFrame> {
        self.labels
            .into_iter()
            .zip(self.images)
            .map(|(label, image)| PreparedFrame { label, image })
    }
}

/// Split frames into batches of at most `batch_size`, keeping order.
///
/// A batch size of 0 is treated as 1.
pub fn partition(frames: Vec<PreparedFrame>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches: Vec<Batch> = Vec::with_capacity(frames.len().div_ceil(batch_size));

    for (index, frame) in frames.into_iter().enumerate() {
        if index % batch_size == 0 {
            batches.push(Batch {
                start: index,
                labels: Vec::with_capacity(batch_size),
                images: Vec::with_capacity(batch_size),
            });
        }
        if let Some(batch) = batches.last_mut() {
            batch.labels.push(frame.label);
            batch.images.push(frame.image);
        }
    }

    batches
}

/// Analysis text tagged with the frames it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledOutput {
    pub labels: Vec<FrameLabel>,
    pub text: String,
}

/// Dispatches batches and collects labeled outputs.
pub struct BatchOrchestrator {
    dispatcher: Arc<dyn AnalysisDispatcher>,
    batch_size: usize,
    mode: BatchMode,
}

impl BatchOrchestrator {
    pub fn new(dispatcher: Arc<dyn AnalysisDispatcher>, batch_size: usize, mode: BatchMode) -> Self {
        Self {
            dispatcher,
            batch_size: batch_size.max(1),
            mode,
        }
    }

    /// Analyze every frame. Outputs come back in completion order.
    pub async fn run(
        &self,
        frames: Vec<PreparedFrame>,
        template: &AnalysisTemplate,
    ) -> PipelineResult<Vec<LabeledOutput>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let frame_count = frames.len();
        let batches = partition(frames, self.batch_size);
        info!(
            frames = frame_count,
            batches = batches.len(),
            batch_size = self.batch_size,
            mode = ?self.mode,
            "Dispatching analysis requests"
        );

        match self.mode {
            BatchMode::Grouped => {
                batches
                    .into_iter()
                    .map(|batch| self.dispatch_batch(batch, template))
                    .collect::<FuturesUnordered<_>>()
                    .try_collect()
                    .await
            }
            BatchMode::Independent => {
                stream::iter(batches.into_iter().flat_map(Batch::into_frames))
                    .map(|frame| self.dispatch_frame(frame, template))
                    .buffer_unordered(self.batch_size)
                    .try_collect()
                    .await
            }
        }
    }

    /// One request for the whole batch.
    ///
    /// A single-frame batch gets the single-frame prompt, which makes it the
    /// same request independent mode would send.
    async fn dispatch_batch(
        &self,
        batch: Batch,
        template: &AnalysisTemplate,
    ) -> PipelineResult<LabeledOutput> {
        let (first_frame, last_frame) = (batch.first_frame(), batch.last_frame());
        debug!(batch_start = batch.start, first_frame, last_frame, "Sending grouped request");

        let prompt = if batch.len() == 1 {
            frame_prompt(first_frame, template)
        } else {
            group_prompt(first_frame, last_frame, template)
        };
        let request = AnalysisRequest::from_template(batch.images, prompt, template);
        let text = self
            .send(request)
            .await
            .map_err(|e| PipelineError::dispatch(first_frame, last_frame, e))?;

        Ok(LabeledOutput {
            labels: batch.labels,
            text,
        })
    }

    async fn dispatch_frame(
        &self,
        frame: PreparedFrame,
        template: &AnalysisTemplate,
    ) -> PipelineResult<LabeledOutput> {
        let frame_number = frame.label.frame_number;
        debug!(frame_number, "Sending frame request");

        let prompt = frame_prompt(frame_number, template);
        let request = AnalysisRequest::from_template(vec![frame.image], prompt, template);
        let text = self
            .send(request)
            .await
            .map_err(|e| PipelineError::dispatch(frame_number, frame_number, e))?;

        Ok(LabeledOutput {
            labels: vec![frame.label],
            text,
        })
    }

    /// Send one request and drain a streamed answer into a single string.
    async fn send(&self, request: AnalysisRequest) -> VisionResult<String> {
        self.dispatcher.analyze(request).await?.collect_text().await
    }
}
