//! SSE parsing for streaming chat completions.
//!
//! Converts the endpoint's byte stream into plain text deltas. Chunks with no
//! content (role announcements, usage frames) are skipped; the `[DONE]`
//! marker ends the stream.

use std::pin::Pin;

use bytes::Bytes;
use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use serde::Deserialize;

use caseforge_core::{CaseError, Result};

const DONE_MARKER: &str = "[DONE]";

/// Stream adapter yielding one text delta per content-bearing SSE chunk.
pub struct DeltaStream<S> {
    inner: EventStream<S>,
}

impl<S> DeltaStream<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
        }
    }
}

impl<S, E> Stream for DeltaStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<String>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    let data = event.data.trim();
                    if data == DONE_MARKER {
                        return Poll::Ready(None);
                    }
                    match parse_delta(data) {
                        Ok(Some(delta)) => return Poll::Ready(Some(Ok(delta))),
                        Ok(None) => continue,
                        Err(e) => return Poll::Ready(Some(Err(e))),
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(CaseError::generation(format!(
                        "SSE stream error: {e}"
                    )))))
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Parses one `data:` payload; `Ok(None)` means a well-formed chunk with no
/// text content.
pub fn parse_delta(data: &str) -> Result<Option<String>> {
    let chunk: ChatCompletionChunk =
        serde_json::from_str(data).map_err(|e| CaseError::json("chat completion chunk", e))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"| 用例 |"}}]}"#;
        assert_eq!(parse_delta(data).unwrap(), Some("| 用例 |".to_owned()));
    }

    #[test]
    fn test_role_announcement_has_no_content() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta(data).unwrap(), None);
    }

    #[test]
    fn test_usage_frame_without_choices() {
        let data = r#"{"usage":{"total_tokens":42}}"#;
        assert_eq!(parse_delta(data).unwrap(), None);
    }

    #[test]
    fn test_malformed_chunk_is_an_error() {
        assert!(parse_delta("not json").is_err());
    }
}
