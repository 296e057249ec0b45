use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Token accounting reported with the terminal `done` event.
///
/// Mirrors the upstream usage object: `input_tokens` covers only the
/// uncached portion of the prompt; cache reads and writes are reported
/// separately when the upstream returns them.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_creation_input_tokens: Option<i64>,
    pub cache_read_input_tokens: Option<i64>,
}

/// Wire-level events relayed to the browser, one JSON object per SSE
/// `data:` frame. Exactly one terminal event (`done` or `error`) is
/// emitted per stream; zero or more `delta` events precede it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    /// One incremental fragment of the assistant reply.
    Delta { text: String },
    /// Terminal success marker with final usage accounting.
    Done { usage: Usage },
    /// Terminal failure marker with a human-readable message.
    Error { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
