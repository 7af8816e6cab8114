//! End-to-end tests against real FFmpeg-decoded video.
//!
//! These need `ffmpeg` and `ffprobe` on PATH. Run with `cargo test -- --ignored`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use framesight_media::{probe_video, FrameSampler};
use framesight_models::{AnalysisTemplate, BatchMode};
use framesight_pipeline::{PipelineConfig, VideoAnalyzer};
use framesight_vision::{AnalysisDispatcher, AnalysisOutput, AnalysisRequest, VisionResult};

/// Answers with the request's prompt and counts calls.
#[derive(Default)]
struct EchoDispatcher {
    calls: AtomicUsize,
}

#[async_trait]
impl AnalysisDispatcher for EchoDispatcher {
    async fn analyze(&self, request: AnalysisRequest) -> VisionResult<AnalysisOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AnalysisOutput::Complete(format!(
            "{} images: {}",
            request.images.len(),
            request.prompt
        )))
    }
}

/// Write a 90-frame, 30 fps test pattern video.
fn synthetic_video(dir: &Path) -> PathBuf {
    let path = dir.join("testsrc.mp4");
    let status = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=3:size=160x120:rate=30",
            "-frames:v",
            "90",
            "-pix_fmt",
            "yuv420p",
            "-y",
        ])
        .arg(&path)
        .status()
        .expect("failed to run ffmpeg");
    assert!(status.success(), "ffmpeg could not generate the test video");
    path
}

fn config(batch_size: usize, mode: BatchMode) -> PipelineConfig {
    PipelineConfig {
        frame_stride: 30,
        workers: Some(2),
        batch_size,
        batch_mode: mode,
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_sampler_yields_stride_multiples() {
    let dir = tempfile::tempdir().unwrap();
    let video = synthetic_video(dir.path());

    let metadata = probe_video(&video).await.unwrap();
    assert_eq!(metadata.frame_count, 90);
    assert!((metadata.fps - 30.0).abs() < 0.01);

    let frames = FrameSampler::new(30)
        .with_workers(Some(2))
        .extract_frames(&video, &metadata)
        .await
        .unwrap();

    let numbers: Vec<u64> = frames.iter().map(|f| f.frame_number).collect();
    assert_eq!(numbers, vec![0, 30, 60]);
    let timestamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
    assert_eq!(timestamps, vec![0.0, 1.0, 2.0]);
    assert!(frames
        .iter()
        .all(|f| f.image.width() == 160 && f.image.height() == 120));
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_independent_video_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let video = synthetic_video(dir.path());
    let dispatcher = Arc::new(EchoDispatcher::default());

    let analysis = VideoAnalyzer::new(config(20, BatchMode::Independent), dispatcher.clone())
        .unwrap()
        .analyze_video(&video, &AnalysisTemplate::default())
        .await
        .unwrap();

    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    let numbers: Vec<u64> = analysis.frames.iter().map(|f| f.frame_number).collect();
    assert_eq!(numbers, vec![0, 30, 60]);
    assert!(analysis.frames[1].result.contains("Analyze frame 30 of the video."));
    assert_eq!(analysis.metadata.width, 160);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_grouped_video_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let video = synthetic_video(dir.path());
    let dispatcher = Arc::new(EchoDispatcher::default());

    let analysis = VideoAnalyzer::new(config(2, BatchMode::Grouped), dispatcher.clone())
        .unwrap()
        .analyze_video(&video, &AnalysisTemplate::default())
        .await
        .unwrap();

    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    let frames = &analysis.frames;
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].result, frames[1].result);
    assert!(frames[0].result.starts_with("2 images: Analyze frames 0 to 30"));
    assert!(frames[2].result.starts_with("1 images: Analyze frame 60"));
}

#[tokio::test]
async fn test_missing_video_fails_at_probe() {
    let dispatcher = Arc::new(EchoDispatcher::default());
    let err = VideoAnalyzer::new(config(20, BatchMode::Independent), dispatcher.clone())
        .unwrap()
        .analyze_video("/no/such/video.mp4", &AnalysisTemplate::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), framesight_pipeline::PipelineStage::Probe);
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
}
