use serde::{Deserialize, Serialize};

/// One server-sent event payload from a streaming `/completion` call.
///
/// Unknown fields (timings, probabilities, slot ids) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionChunk {
    /// The text generated since the previous chunk.
    #[serde(default)]
    pub content: String,

    /// True on the final chunk of the stream.
    #[serde(default)]
    pub stop: bool,

    /// Number of tokens predicted so far, reported on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_predicted: Option<u64>,

    /// Error reported in place of content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServerErrorBody>,
}

impl CompletionChunk {
    /// A chunk carrying `content`.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// The terminating chunk.
    pub fn end() -> Self {
        Self {
            stop: true,
            ..Self::default()
        }
    }
}

/// Error object the server embeds in responses and stream events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerErrorBody {
    /// HTTP-like status code.
    #[serde(default)]
    pub code: Option<u16>,

    /// Human-readable error message.
    #[serde(default)]
    pub message: String,

    /// Error type string.
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}
