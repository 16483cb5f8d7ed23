use novagate_protocol::canonical::{
    CanonicalDelta, CanonicalFinishReason, CanonicalMessage, CanonicalPart, CanonicalRequest,
    CanonicalRole, CanonicalSnapshot, CanonicalTool, CanonicalToolChoice, CanonicalToolCall,
    CanonicalUsage, SamplingParams,
};
use novagate_protocol::claude::{
    ClaudeContentBlock, ClaudeDelta, ClaudeImageSource, ClaudeMessage, ClaudeMessageContent,
    ClaudeMessagesRequest, ClaudeMessagesResponse, ClaudeStreamEvent, ClaudeSystemPrompt,
    ClaudeTool, ClaudeToolChoice, ClaudeToolResultContent, ClaudeUsage,
};
use novagate_protocol::ApiFamily;
use serde_json::Value as Json;

use crate::error::TransformError;
use crate::tool_calls;

fn malformed(e: serde_json::Error) -> TransformError {
    TransformError::Malformed {
        family: ApiFamily::Messages,
        source: e,
    }
}

pub fn to_canonical(body: &Json) -> Result<CanonicalRequest, TransformError> {
    let req: ClaudeMessagesRequest = serde_json::from_value(body.clone()).map_err(malformed)?;

    let system = req.system.map(|s| match s {
        ClaudeSystemPrompt::Text(t) => t,
        ClaudeSystemPrompt::Blocks(blocks) => blocks
            .into_iter()
            .filter_map(|b| match b {
                ClaudeContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    });

    let messages = req.messages.into_iter().map(claude_message_to_canonical).collect();

    let tools = req
        .tools
        .into_iter()
        .map(|t| CanonicalTool {
            name: t.name,
            description: t.description,
            parameters: t.input_schema,
        })
        .collect();

    let tool_choice = req.tool_choice.map(|c| match c {
        ClaudeToolChoice::Auto => CanonicalToolChoice::Auto,
        ClaudeToolChoice::None => CanonicalToolChoice::None,
        ClaudeToolChoice::Any => CanonicalToolChoice::Required,
        ClaudeToolChoice::Tool { name } => CanonicalToolChoice::Named { name },
    });

    Ok(CanonicalRequest {
        model: req.model,
        system,
        messages,
        tools,
        tool_choice,
        sampling: SamplingParams {
            temperature: req.temperature,
            top_p: req.top_p,
            max_tokens: Some(req.max_tokens),
            stop: req.stop_sequences,
        },
        stream: req.stream.unwrap_or(false),
        extra: None,
    })
}

fn claude_message_to_canonical(m: ClaudeMessage) -> CanonicalMessage {
    let role = if m.role == "assistant" {
        CanonicalRole::Assistant
    } else {
        CanonicalRole::User
    };
    let blocks = match m.content {
        ClaudeMessageContent::Text(text) => vec![ClaudeContentBlock::Text { text }],
        ClaudeMessageContent::Blocks(blocks) => blocks,
    };
    CanonicalMessage {
        role,
        parts: blocks.into_iter().map(content_block_to_canonical).collect(),
    }
}

fn content_block_to_canonical(block: ClaudeContentBlock) -> CanonicalPart {
    match block {
        ClaudeContentBlock::Text { text } => CanonicalPart::Text { text },
        ClaudeContentBlock::Image { source } => CanonicalPart::Image {
            mime: source.media_type,
            source: source.data,
        },
        ClaudeContentBlock::ToolUse { id, name, input } => CanonicalPart::ToolCall {
            id,
            name,
            arguments: input,
        },
        ClaudeContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => CanonicalPart::ToolResult {
            tool_call_id: tool_use_id,
            content: match content {
                ClaudeToolResultContent::Text(t) => t,
                ClaudeToolResultContent::Blocks(blocks) => blocks
                    .into_iter()
                    .filter_map(|b| match b {
                        ClaudeContentBlock::Text { text } => Some(text),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            is_error,
        },
    }
}

pub fn from_canonical(req: &CanonicalRequest) -> Result<Json, TransformError> {
    let messages = req.messages.iter().map(canonical_message_to_claude).collect();

    let tools = req
        .tools
        .iter()
        .map(|t| ClaudeTool {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.parameters.clone(),
        })
        .collect();

    let tool_choice = req.tool_choice.as_ref().map(|c| match c {
        CanonicalToolChoice::Auto => ClaudeToolChoice::Auto,
        CanonicalToolChoice::None => ClaudeToolChoice::None,
        CanonicalToolChoice::Required => ClaudeToolChoice::Any,
        CanonicalToolChoice::Named { name } => ClaudeToolChoice::Tool { name: name.clone() },
    });

    let out = ClaudeMessagesRequest {
        model: req.model.clone(),
        messages,
        max_tokens: req.sampling.max_tokens.unwrap_or(4096),
        system: req.system.clone().map(ClaudeSystemPrompt::Text),
        temperature: req.sampling.temperature,
        top_p: req.sampling.top_p,
        stop_sequences: req.sampling.stop.clone(),
        stream: Some(req.stream),
        tools,
        tool_choice,
    };
    serde_json::to_value(out).map_err(malformed)
}

fn canonical_message_to_claude(m: &CanonicalMessage) -> ClaudeMessage {
    let role = match m.role {
        CanonicalRole::Assistant => "assistant",
        _ => "user",
    };
    let blocks = m
        .parts
        .iter()
        .map(|part| match part {
            CanonicalPart::Text { text } => ClaudeContentBlock::Text { text: text.clone() },
            CanonicalPart::Image { mime, source } => ClaudeContentBlock::Image {
                source: ClaudeImageSource {
                    kind: "base64".to_string(),
                    media_type: mime.clone(),
                    data: source.clone(),
                },
            },
            CanonicalPart::Audio { source, .. } | CanonicalPart::File { source, .. } => {
                ClaudeContentBlock::Text { text: source.clone() }
            }
            CanonicalPart::ToolCall { id, name, arguments } => ClaudeContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: arguments.clone(),
            },
            CanonicalPart::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => ClaudeContentBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: ClaudeToolResultContent::Text(content.clone()),
                is_error: *is_error,
            },
        })
        .collect();
    ClaudeMessage {
        role: role.to_string(),
        content: ClaudeMessageContent::Blocks(blocks),
    }
}

pub fn response_to_snapshot(body: &Json) -> Result<CanonicalSnapshot, TransformError> {
    let resp: ClaudeMessagesResponse = serde_json::from_value(body.clone()).map_err(malformed)?;
    let mut snapshot = CanonicalSnapshot::default();
    for block in resp.content {
        match block {
            ClaudeContentBlock::Text { text } => snapshot.text.push_str(&text),
            ClaudeContentBlock::ToolUse { id, name, input } => {
                snapshot.tool_calls.push(CanonicalToolCall {
                    id,
                    name,
                    arguments_json: input.to_string(),
                });
            }
            _ => {}
        }
    }
    snapshot.finish_reason = resp.stop_reason.as_deref().map(map_finish_reason_in);
    snapshot.usage = Some(CanonicalUsage {
        prompt_tokens: Some(resp.usage.input_tokens),
        completion_tokens: Some(resp.usage.output_tokens),
        cached_tokens: resp.usage.cache_read_input_tokens,
        cache_write_tokens: resp.usage.cache_creation_input_tokens,
    });
    Ok(snapshot)
}

pub fn snapshot_to_response(snapshot: &CanonicalSnapshot) -> Result<Json, TransformError> {
    let mut content = Vec::new();
    if !snapshot.text.is_empty() {
        content.push(ClaudeContentBlock::Text {
            text: snapshot.text.clone(),
        });
    }
    for call in &snapshot.tool_calls {
        content.push(ClaudeContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: serde_json::from_str(&call.arguments_json).unwrap_or(Json::Null),
        });
    }

    let usage = snapshot.usage.clone().unwrap_or_default();
    let out = ClaudeMessagesResponse {
        id: tool_calls::synthesize_id("msg"),
        kind: "message".to_string(),
        role: "assistant".to_string(),
        model: String::new(),
        content,
        stop_reason: snapshot.finish_reason.map(map_finish_reason_out),
        stop_sequence: None,
        usage: ClaudeUsage {
            input_tokens: usage.prompt_tokens.unwrap_or_default(),
            output_tokens: usage.completion_tokens.unwrap_or_default(),
            cache_creation_input_tokens: usage.cache_write_tokens,
            cache_read_input_tokens: usage.cached_tokens,
        },
    };
    serde_json::to_value(out).map_err(malformed)
}

fn map_finish_reason_in(s: &str) -> CanonicalFinishReason {
    match s {
        "max_tokens" => CanonicalFinishReason::Length,
        "tool_use" => CanonicalFinishReason::ToolCalls,
        "stop_sequence" | "end_turn" => CanonicalFinishReason::Stop,
        _ => CanonicalFinishReason::Stop,
    }
}

fn map_finish_reason_out(r: CanonicalFinishReason) -> String {
    match r {
        CanonicalFinishReason::Stop => "end_turn",
        CanonicalFinishReason::Length => "max_tokens",
        CanonicalFinishReason::ToolCalls => "tool_use",
        CanonicalFinishReason::ContentFilter => "stop_sequence",
        CanonicalFinishReason::Error => "end_turn",
    }
    .to_string()
}

/// `index_ids` remembers which tool-call id owns each content-block index,
/// since `content_block_delta` only repeats the index, not the id assigned
/// at `content_block_start`.
pub fn decode_stream_event(
    data: &str,
    index_ids: &mut std::collections::HashMap<u32, String>,
) -> Result<Vec<CanonicalDelta>, TransformError> {
    let event: ClaudeStreamEvent = serde_json::from_str(data).map_err(malformed)?;
    Ok(match event {
        ClaudeStreamEvent::MessageStart { .. } => vec![CanonicalDelta::MessageStart],
        ClaudeStreamEvent::ContentBlockStart {
            index,
            content_block: ClaudeContentBlock::ToolUse { id, name, .. },
        } => {
            index_ids.insert(index, id.clone());
            vec![CanonicalDelta::ToolCallStart { id, name }]
        }
        ClaudeStreamEvent::ContentBlockStart { .. } => Vec::new(),
        ClaudeStreamEvent::ContentBlockDelta { index, delta } => match delta {
            ClaudeDelta::TextDelta { text } => vec![CanonicalDelta::TextDelta { text }],
            ClaudeDelta::InputJsonDelta { partial_json } => {
                match index_ids.get(&index) {
                    Some(id) => vec![CanonicalDelta::ToolCallArgumentsDelta {
                        id: id.clone(),
                        partial_json,
                    }],
                    None => Vec::new(),
                }
            }
        },
        ClaudeStreamEvent::ContentBlockStop { index } => {
            match index_ids.get(&index) {
                Some(id) => vec![CanonicalDelta::ToolCallEnd { id: id.clone() }],
                None => Vec::new(),
            }
        }
        ClaudeStreamEvent::MessageDelta { delta, usage } => {
            let mut out = vec![CanonicalDelta::Usage {
                usage: CanonicalUsage {
                    prompt_tokens: Some(usage.input_tokens),
                    completion_tokens: Some(usage.output_tokens),
                    cached_tokens: usage.cache_read_input_tokens,
                    cache_write_tokens: usage.cache_creation_input_tokens,
                },
            }];
            if let Some(reason) = delta.stop_reason {
                out.push(CanonicalDelta::Finish {
                    reason: map_finish_reason_in(&reason),
                });
            }
            out
        }
        ClaudeStreamEvent::MessageStop | ClaudeStreamEvent::Ping => Vec::new(),
    })
}

pub fn encode_deltas(deltas: &[CanonicalDelta]) -> Vec<(Option<&'static str>, Json)> {
    let mut out = Vec::new();
    for delta in deltas {
        let (event, value) = match delta {
            CanonicalDelta::TextDelta { text } => (
                "content_block_delta",
                ClaudeStreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: ClaudeDelta::TextDelta { text: text.clone() },
                },
            ),
            CanonicalDelta::ToolCallArgumentsDelta { partial_json, .. } => (
                "content_block_delta",
                ClaudeStreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: ClaudeDelta::InputJsonDelta {
                        partial_json: partial_json.clone(),
                    },
                },
            ),
            _ => continue,
        };
        out.push((
            Some(event),
            serde_json::to_value(value).expect("claude stream event always serializes"),
        ));
    }
    out
}
