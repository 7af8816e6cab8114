//! In-process dispatcher double for orchestration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use framesight_models::{FrameLabel, NormalizedImage};
use framesight_vision::{AnalysisDispatcher, AnalysisOutput, AnalysisRequest, VisionError, VisionResult};

use crate::batch::PreparedFrame;

/// Frames whose image payload names their frame number.
pub fn prepared_frames(frame_numbers: &[u64]) -> Vec<PreparedFrame> {
    frame_numbers
        .iter()
        .map(|&n| PreparedFrame {
            label: FrameLabel::new(n, n as f64 / 30.0),
            image: NormalizedImage {
                data: format!("frame-{}", n),
                media_type: "image/png".to_string(),
                width: 1,
                height: 1,
                estimated_tokens: 0,
            },
        })
        .collect()
}

/// What the dispatcher saw for one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub images: usize,
    pub frames: Vec<u64>,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Answers `analysis of frame N` (or `frames A-B`) after a scripted delay.
pub struct ScriptedDispatcher {
    default_delay: Duration,
    delays: HashMap<u64, Duration>,
    failures: HashMap<u64, fn() -> VisionError>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self {
            default_delay: Duration::ZERO,
            delays: HashMap::new(),
            failures: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Delay requests whose first frame is `frame_number`.
    pub fn with_delay(mut self, frame_number: u64, delay: Duration) -> Self {
        self.delays.insert(frame_number, delay);
        self
    }

    /// Fail requests that include `frame_number`.
    pub fn fail_on(mut self, frame_number: u64, error: fn() -> VisionError) -> Self {
        self.failures.insert(frame_number, error);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn frame_of(image: &NormalizedImage) -> u64 {
    image
        .data
        .strip_prefix("frame-")
        .and_then(|n| n.parse().ok())
        .unwrap_or(u64::MAX)
}

#[async_trait]
impl AnalysisDispatcher for ScriptedDispatcher {
    async fn analyze(&self, request: AnalysisRequest) -> VisionResult<AnalysisOutput> {
        let frames: Vec<u64> = request.images.iter().map(frame_of).collect();
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: request.prompt.clone(),
            images: request.images.len(),
            frames: frames.clone(),
            system: request.system.clone(),
            max_tokens: request.max_tokens,
            stream: request.stream,
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let first = frames.first().copied().unwrap_or_default();
        let delay = self.delays.get(&first).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = frames.iter().find_map(|f| self.failures.get(f)) {
            return Err(error());
        }

        let text = match frames.as_slice() {
            [single] => format!("analysis of frame {}", single),
            [first, .., last] => format!("analysis of frames {}-{}", first, last),
            [] => "analysis of nothing".to_string(),
        };

        if request.stream {
            let chunks: Vec<VisionResult<String>> = text
                .split_inclusive(' ')
                .map(|chunk| Ok(chunk.to_string()))
                .collect();
            Ok(AnalysisOutput::Stream(stream::iter(chunks).boxed()))
        } else {
            Ok(AnalysisOutput::Complete(text))
        }
    }
}
