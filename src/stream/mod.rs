pub mod lines;
pub mod sink;
pub mod sse;

pub use lines::{LineDecoder, LineStream};
pub use sink::{client_channel, ClientSink};

use serde::Deserialize;

/// One parsed upstream SSE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty content fragment.
    Delta(String),
    /// The upstream `[DONE]` sentinel.
    Done,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parse a single upstream line into a [`StreamEvent`].
///
/// Only `data:` lines carry payloads. Blank lines, comments, other fields,
/// chunks without content and malformed JSON all yield `None`.
#[must_use]
pub fn parse_stream_line(line: &str) -> Option<StreamEvent> {
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim() == "[DONE]" {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<CompletionChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamEvent::Delta),
        Err(err) => {
            tracing::trace!(error = %err, "skipping malformed upstream SSE payload");
            None
        }
    }
}
