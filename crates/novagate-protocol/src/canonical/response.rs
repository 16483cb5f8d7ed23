use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalFinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    /// Synthesised when the upstream stream terminates mid-tool-call.
    Error,
}

/// One incremental event produced by a family's `StreamDecoder::feed`.
/// `novagate-transform`'s `StreamTransformer` folds a sequence of these
/// into a `CanonicalSnapshot` and re-encodes them into the destination
/// family's own delta shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalDelta {
    MessageStart,
    TextDelta {
        text: String,
    },
    ToolCallStart {
        id: String,
        name: String,
    },
    /// Raw JSON is buffered until `close()`; arguments must be complete
    /// JSON by close time, not per-delta.
    ToolCallArgumentsDelta {
        id: String,
        partial_json: String,
    },
    ToolCallEnd {
        id: String,
    },
    Usage {
        usage: CanonicalUsage,
    },
    Finish {
        reason: CanonicalFinishReason,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
    pub cache_write_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalToolCall {
    pub id: String,
    pub name: String,
    /// Accumulated argument JSON text; parsed to `Json` once complete.
    pub arguments_json: String,
}

/// The reconstructed full-response snapshot maintained incrementally by a
/// stream transcoder and produced directly by a buffered one. Concatenated
/// text deltas must equal the final assistant content; every tool call must
/// have a stable id and complete arguments JSON at `close()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalSnapshot {
    pub text: String,
    pub tool_calls: Vec<CanonicalToolCall>,
    pub usage: Option<CanonicalUsage>,
    pub finish_reason: Option<CanonicalFinishReason>,
    pub truncated: bool,
}

impl CanonicalSnapshot {
    pub fn apply(&mut self, delta: &CanonicalDelta) {
        match delta {
            CanonicalDelta::MessageStart => {}
            CanonicalDelta::TextDelta { text } => self.text.push_str(text),
            CanonicalDelta::ToolCallStart { id, name } => {
                self.tool_calls.push(CanonicalToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments_json: String::new(),
                });
            }
            CanonicalDelta::ToolCallArgumentsDelta { id, partial_json } => {
                if let Some(call) = self.tool_calls.iter_mut().find(|c| &c.id == id) {
                    call.arguments_json.push_str(partial_json);
                }
            }
            CanonicalDelta::ToolCallEnd { .. } => {}
            CanonicalDelta::Usage { usage } => self.usage = Some(usage.clone()),
            CanonicalDelta::Finish { reason } => self.finish_reason = Some(*reason),
        }
    }

    /// Tool call arguments that failed to parse as JSON at close time —
    /// the upstream stream was truncated mid-call.
    pub fn incomplete_tool_calls(&self) -> Vec<&CanonicalToolCall> {
        self.tool_calls
            .iter()
            .filter(|c| serde_json::from_str::<Json>(&c.arguments_json).is_err())
            .collect()
    }
}
