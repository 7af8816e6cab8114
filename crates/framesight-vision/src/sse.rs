//! Server-sent event decoding for streamed responses.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tracing::warn;

use crate::error::{VisionError, VisionResult};
use crate::types::StreamEvent;

/// Splits a byte stream into `data:` payloads, one per line.
///
/// Chunks may end anywhere, including inside a multi-byte character, so
/// bytes are buffered until a newline arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every complete `data:` payload it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = data_payload(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    line.strip_prefix("data:")
        .map(|data| data.strip_prefix(' ').unwrap_or(data).to_string())
}

/// What one event means for the text stream.
enum EventAction {
    Emit(String),
    Skip,
    Stop,
}

fn interpret(data: &str) -> VisionResult<EventAction> {
    match serde_json::from_str::<StreamEvent>(data)? {
        StreamEvent::ContentBlockDelta { delta } => Ok(match delta.text {
            Some(text) if !text.is_empty() => EventAction::Emit(text),
            _ => EventAction::Skip,
        }),
        StreamEvent::MessageStop => Ok(EventAction::Stop),
        StreamEvent::Error { error } => Err(VisionError::Api(error.message)),
        StreamEvent::Other => Ok(EventAction::Skip),
    }
}

struct SseState {
    body: BoxStream<'static, VisionResult<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    body_done: bool,
    stopped: bool,
}

/// Turn a streamed response body into text chunks.
///
/// The stream ends at `message_stop` or when the body ends. An `error` event,
/// an unparseable event or a transport failure yields one error and ends it.
pub fn text_stream<S, B>(body: S) -> BoxStream<'static, VisionResult<String>>
where
    S: Stream<Item = VisionResult<B>> + Send + 'static,
    B: AsRef<[u8]> + 'static,
{
    let state = SseState {
        body: body.map_ok(|chunk| chunk.as_ref().to_vec()).boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        body_done: false,
        stopped: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.stopped {
                return None;
            }

            if let Some(data) = state.pending.pop_front() {
                match interpret(&data) {
                    Ok(EventAction::Emit(text)) => return Some((Ok(text), state)),
                    Ok(EventAction::Skip) => continue,
                    Ok(EventAction::Stop) => return None,
                    Err(e) => {
                        warn!(error = %e, "Stream event error");
                        state.stopped = true;
                        return Some((Err(e), state));
                    }
                }
            }

            if state.body_done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.push(&chunk);
                    state.pending.extend(payloads);
                }
                Some(Err(e)) => {
                    state.stopped = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.body_done = true;
                    if let Some(data) = state.decoder.finish() {
                        state.pending.push_back(data);
                    }
                }
            }
        }
    })
    .boxed()
}
