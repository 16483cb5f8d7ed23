use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A canonical chat role. System messages are lifted out of `messages` into
/// `CanonicalRequest::system` during `to_canonical` (CHAT `role: system` ↔
/// MSG top-level `system` ↔ GEM `systemInstruction`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalRole {
    User,
    Assistant,
    Tool,
}

/// One part of a (possibly multimodal) message. `mime` drives the
/// UNSUPPORTED_CONTENT check when converting into a family that can't
/// represent the part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalPart {
    Text {
        text: String,
    },
    Image {
        mime: String,
        /// Either a data URL payload or a remote URL, opaque to the canonical layer.
        source: String,
    },
    Audio {
        mime: String,
        source: String,
    },
    File {
        mime: String,
        source: String,
        name: Option<String>,
    },
    /// An assistant-issued tool call. `id` is preserved verbatim across
    /// CHAT/RESP/MSG; synthesised for GEM when the upstream omits one.
    ToolCall {
        id: String,
        name: String,
        arguments: Json,
    },
    /// The result of a tool call, addressed back by `tool_call_id`.
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub role: CanonicalRole,
    pub parts: Vec<CanonicalPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTool {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CanonicalToolChoice {
    Auto,
    None,
    Required,
    Named { name: String },
}

/// Sampling params mapped through a fixed per-family table. Destination
/// families silently drop fields they don't support.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
}

/// Remembers a tool-call id synthesised for a family (GEM) that doesn't
/// carry one natively, so the response side can translate it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRef {
    pub synthesized_id: String,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRequest {
    /// Rewritten to the upstream model id by the Dispatcher before the
    /// transcoder runs; the transcoder only ever sees the already-resolved
    /// upstream model.
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<CanonicalMessage>,
    pub tools: Vec<CanonicalTool>,
    pub tool_choice: Option<CanonicalToolChoice>,
    pub sampling: SamplingParams,
    pub stream: bool,
    /// Provider `extraBody` overrides, deep-merged last by the Dispatcher
    /// after `from_canonical` runs, so they win over transcoder output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Json>,
}

impl CanonicalRequest {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}
