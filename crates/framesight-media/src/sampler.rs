//! Stride-based frame sampling.
//!
//! A single FFmpeg process decodes the container sequentially and writes every
//! `stride`-th frame to stdout as packed RGB. The parent reads frames in small
//! windows and hands each window to a rayon pool that is built for the call
//! and dropped when it returns. Workers turn raw buffers into [`SampledFrame`]s
//! and run the caller's per-frame step right away, so raw frames never outlive
//! their window. Results are collected in submission order, which is frame
//! index order.
//!
//! Frames are selected and labeled by presentation time, which FFmpeg's
//! `showinfo` filter reports on stderr. A frame the decoder drops is absent
//! from the output and does not renumber the frames after it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use rayon::prelude::*;
use rayon::ThreadPool;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use framesight_models::{FrameLabel, TimestampPolicy, VideoMetadata};

use crate::command::{showinfo_pts_time, FfmpegCommand};
use crate::error::{MediaError, MediaResult};

/// Frames buffered per worker before a window is dispatched.
const FRAMES_PER_WORKER: usize = 2;

/// How long to wait for a frame's timestamp once its pixels have been read.
/// FFmpeg logs the frame before writing it, so this only runs out when the
/// log is not arriving at all.
const POSITION_WAIT: Duration = Duration::from_secs(5);

/// A decoded frame at a sampled position.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Original 0-based frame index (a multiple of the stride)
    pub frame_number: u64,
    /// Timestamp in seconds
    pub timestamp: f64,
    /// Pixels in RGB order
    pub image: RgbImage,
}

impl SampledFrame {
    pub fn label(&self) -> FrameLabel {
        FrameLabel::new(self.frame_number, self.timestamp)
    }
}

/// Raw bytes for one frame, as read from the decoder.
struct RawFrame {
    frame_number: u64,
    timestamp: f64,
    bytes: Vec<u8>,
}

impl RawFrame {
    /// `None` when the buffer does not hold a full frame.
    fn into_frame(self, width: u32, height: u32) -> Option<SampledFrame> {
        let image = RgbImage::from_raw(width, height, self.bytes)?;
        Some(SampledFrame {
            frame_number: self.frame_number,
            timestamp: self.timestamp,
            image,
        })
    }
}

/// What the read loop produced.
struct DecodeOutcome<T> {
    items: Vec<T>,
    /// Whether the decoder's output was read to the end
    exhausted: bool,
}

/// Samples frames `0, stride, 2*stride, ...` from a video.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    stride: u64,
    workers: Option<usize>,
    timestamp_policy: TimestampPolicy,
}

impl FrameSampler {
    /// Create a sampler. A stride of 0 is treated as 1.
    pub fn new(stride: u64) -> Self {
        Self {
            stride: stride.max(1),
            workers: None,
            timestamp_policy: TimestampPolicy::default(),
        }
    }

    /// Override the worker count (defaults to the number of cores).
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers.filter(|w| *w > 0);
        self
    }

    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp_policy = policy;
        self
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Frame indices this sampler visits for a video.
    pub fn frame_indices(&self, metadata: &VideoMetadata) -> impl Iterator<Item = u64> {
        (0..metadata.frame_count).step_by(self.stride as usize)
    }

    /// Decode every sampled frame.
    pub async fn extract_frames(
        &self,
        video_path: impl AsRef<Path>,
        metadata: &VideoMetadata,
    ) -> MediaResult<Vec<SampledFrame>> {
        self.sample_with(video_path, metadata, Ok).await
    }

    /// Decode every sampled frame and run `process` on it inside the worker pool.
    ///
    /// Frames that never decode (end of stream reached early) are omitted
    /// silently. An error from `process` fails the whole call.
    pub async fn sample_with<T, F>(
        &self,
        video_path: impl AsRef<Path>,
        metadata: &VideoMetadata,
        process: F,
    ) -> MediaResult<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(SampledFrame) -> MediaResult<T> + Send + Sync + 'static,
    {
        let video_path = video_path.as_ref();

        if metadata.rgb_frame_size() == 0 {
            return Err(MediaError::video_open(
                video_path,
                format!("video stream has no size ({}x{})", metadata.width, metadata.height),
            ));
        }

        let pool = Arc::new(self.build_pool()?);
        info!(
            path = %video_path.display(),
            stride = self.stride,
            workers = pool.current_num_threads(),
            expected = metadata.sampled_positions(self.stride),
            "Sampling frames"
        );

        let by_time = metadata.fps > 0.0;
        let command = if by_time {
            FfmpegCommand::new(video_path)
                .select_every_at(self.stride, metadata.fps, metadata.start_time)
                .show_frame_info()
                .log_level("info")
        } else {
            FfmpegCommand::new(video_path).select_every(self.stride)
        };
        let mut child = command
            .passthrough_timing()
            .pixel_format("rgb24")
            .raw_video()
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;

        let (positions_tx, positions_rx) = mpsc::unbounded_channel();
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_decoder_log(stderr, positions_tx)));
        let positions = if by_time && stderr_task.is_some() {
            Some(positions_rx)
        } else {
            None
        };

        let outcome = self
            .decode_stream(stdout, metadata, positions, pool, Arc::new(process))
            .await?;

        if !outcome.exhausted {
            // Every sampled position was read; the rest of the stream is not needed.
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Ok(outcome.items);
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            if outcome.items.is_empty() {
                return Err(MediaError::video_open(
                    video_path,
                    format!("ffmpeg exited with {}: {}", status, stderr.trim()),
                ));
            }
            warn!(
                path = %video_path.display(),
                exit_code = ?status.code(),
                decoded = outcome.items.len(),
                "FFmpeg exited with an error after decoding some frames"
            );
        }

        Ok(outcome.items)
    }

    fn build_pool(&self) -> MediaResult<ThreadPool> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("framesight-decode-{}", i));
        if let Some(workers) = self.workers {
            builder = builder.num_threads(workers);
        }
        builder
            .build()
            .map_err(|e| MediaError::worker_pool(format!("failed to start worker pool: {}", e)))
    }

    /// Read raw frames from `reader` window by window and process them on `pool`.
    ///
    /// With `positions`, each frame is labeled from the presentation time the
    /// decoder reported for it. Without it (or once the reports stop), the
    /// n-th frame read is labeled `n * stride`.
    async fn decode_stream<R, T, F>(
        &self,
        mut reader: R,
        metadata: &VideoMetadata,
        mut positions: Option<mpsc::UnboundedReceiver<f64>>,
        pool: Arc<ThreadPool>,
        process: Arc<F>,
    ) -> MediaResult<DecodeOutcome<T>>
    where
        R: AsyncRead + Unpin,
        T: Send + 'static,
        F: Fn(SampledFrame) -> MediaResult<T> + Send + Sync + 'static,
    {
        let frame_size = metadata.rgb_frame_size();
        let (width, height) = (metadata.width, metadata.height);
        let window_size = pool.current_num_threads().max(1) * FRAMES_PER_WORKER;

        let mut items = Vec::new();
        let mut ordinal = 0u64;
        let mut last_number: Option<u64> = None;
        let mut exhausted = false;
        let mut finished = false;

        loop {
            let mut window = Vec::with_capacity(window_size);

            while window.len() < window_size {
                if positions.is_none()
                    && metadata.frame_count > 0
                    && ordinal * self.stride >= metadata.frame_count
                {
                    finished = true;
                    break;
                }

                let mut bytes = vec![0u8; frame_size];
                match reader.read_exact(&mut bytes).await {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        exhausted = true;
                        finished = true;
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }

                let frame_number = match next_position(&mut positions, metadata).await {
                    Some(number) => number,
                    None => ordinal * self.stride,
                };
                ordinal += 1;

                if metadata.frame_count > 0 && frame_number >= metadata.frame_count {
                    finished = true;
                    break;
                }
                if matches!(last_number, Some(last) if frame_number <= last) {
                    debug!(frame_number, "Skipping frame at an already sampled position");
                    continue;
                }
                last_number = Some(frame_number);

                window.push(RawFrame {
                    frame_number,
                    timestamp: self
                        .timestamp_policy
                        .compute(frame_number, self.stride, metadata.fps),
                    bytes,
                });
            }

            if !window.is_empty() {
                debug!(frames = window.len(), first = window[0].frame_number, "Dispatching frame window");

                let pool = Arc::clone(&pool);
                let process = Arc::clone(&process);
                let processed = tokio::task::spawn_blocking(move || {
                    pool.install(|| {
                        window
                            .into_par_iter()
                            .filter_map(|raw| raw.into_frame(width, height))
                            .map(|frame| (*process)(frame))
                            .collect::<MediaResult<Vec<T>>>()
                    })
                })
                .await
                .map_err(|e| MediaError::worker_pool(format!("frame worker task failed: {}", e)))??;

                items.extend(processed);
            }

            if finished {
                break;
            }
        }

        Ok(DecodeOutcome { items, exhausted })
    }
}

/// Source index of the frame just read, from the decoder's timestamp report.
///
/// Stops consulting the reports for the rest of the call once one is missing,
/// so a late report is never paired with the wrong frame.
async fn next_position(
    positions: &mut Option<mpsc::UnboundedReceiver<f64>>,
    metadata: &VideoMetadata,
) -> Option<u64> {
    let receiver = positions.as_mut()?;
    let pts_time = match tokio::time::timeout(POSITION_WAIT, receiver.recv()).await {
        Ok(Some(pts_time)) => pts_time,
        _ => {
            warn!("Decoder stopped reporting frame timestamps; numbering remaining frames by stride");
            *positions = None;
            return None;
        }
    };
    let number = metadata.frame_index_at(pts_time);
    if number.is_none() {
        *positions = None;
    }
    number
}

/// Forward `showinfo` timestamps and keep everything else as the error log.
async fn read_decoder_log<R>(stderr: R, positions: mpsc::UnboundedSender<f64>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    let mut log = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(pts_time) = showinfo_pts_time(&line) {
            let _ = positions.send(pts_time);
        } else if !line.contains("Parsed_showinfo") {
            log.push_str(&line);
            log.push('\n');
        }
    }

    log
}
