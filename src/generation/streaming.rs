//! Server-sent event decoding and streamed-output clean-up

use super::provider::{ChunkStream, GenerationError};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Response;

/// What to do with one decoded event
#[derive(Debug, PartialEq)]
pub enum SseStep {
    Emit(String),
    Skip,
    Done,
}

/// Turn an SSE response into a stream of text deltas.
///
/// `handler` gets the event name and data of each event. The stream ends on
/// [`SseStep::Done`] or at the end of the body, and stops after the first
/// error.
pub fn chunk_stream_from_sse<H>(response: Response, mut handler: H) -> ChunkStream
where
    H: FnMut(&str, &str) -> Result<SseStep, GenerationError> + Send + 'static,
{
    let mut events = Box::pin(response.bytes_stream().eventsource());

    Box::pin(async_stream::stream! {
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(GenerationError::Stream(e.to_string()));
                    return;
                }
            };
            match handler(&event.event, &event.data) {
                Ok(SseStep::Emit(text)) => yield Ok(text),
                Ok(SseStep::Skip) => {}
                Ok(SseStep::Done) => return,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    })
}

/// Removes the code fence models like to wrap documents in.
///
/// The first chunk loses one "```string" and one "```" marker and its
/// leading whitespace; the last chunk loses trailing backticks. One chunk
/// is held back so the last one can be recognised.
#[derive(Debug)]
pub struct FenceStripper {
    first: bool,
    held: Option<String>,
}

impl Default for FenceStripper {
    fn default() -> Self {
        Self {
            first: true,
            held: None,
        }
    }
}

impl FenceStripper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the next chunk and release the previous one
    pub fn push(&mut self, chunk: String) -> Option<String> {
        let chunk = if self.first {
            self.first = false;
            chunk
                .replacen("```string", "", 1)
                .replacen("```", "", 1)
                .trim_start()
                .to_string()
        } else {
            chunk
        };
        self.held.replace(chunk)
    }

    /// Release the held chunk as the last one
    pub fn finish(self) -> Option<String> {
        self.held
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| chunk.trim_end_matches('`').to_string())
    }
}

/// Apply [`FenceStripper`] to a chunk stream, dropping empty chunks
pub fn strip_fences(mut inner: ChunkStream) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut stripper = FenceStripper::new();
        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    if let Some(out) = stripper.push(chunk) {
                        if !out.is_empty() {
                            yield Ok(out);
                        }
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        if let Some(out) = stripper.finish() {
            if !out.is_empty() {
                yield Ok(out);
            }
        }
    })
}
