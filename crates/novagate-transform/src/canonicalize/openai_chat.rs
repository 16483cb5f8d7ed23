use novagate_protocol::canonical::{
    CanonicalDelta, CanonicalFinishReason, CanonicalMessage, CanonicalPart, CanonicalRequest,
    CanonicalRole, CanonicalSnapshot, CanonicalTool, CanonicalToolChoice, SamplingParams,
};
use novagate_protocol::openai::chat::{
    ChatChoice, ChatChunkChoice, ChatChunkDelta, ChatChunkToolCall, ChatChunkToolCallFunction,
    ChatToolCallFunction,
};
use novagate_protocol::openai::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ChatMessageContent, ChatMessagePart, ChatToolCall, ChatToolChoice, ChatToolDefinition,
};
use novagate_protocol::ApiFamily;
use serde_json::Value as Json;

use crate::error::TransformError;
use crate::tool_calls;

fn malformed(e: serde_json::Error) -> TransformError {
    TransformError::Malformed {
        family: ApiFamily::Chat,
        source: e,
    }
}

pub fn to_canonical(body: &Json) -> Result<CanonicalRequest, TransformError> {
    let req: ChatCompletionRequest = serde_json::from_value(body.clone()).map_err(malformed)?;

    let mut system = None;
    let mut messages = Vec::with_capacity(req.messages.len());
    for m in req.messages {
        if m.role == "system" || m.role == "developer" {
            if let Some(ChatMessageContent::Text(text)) = m.content {
                system = Some(text);
            }
            continue;
        }
        messages.push(chat_message_to_canonical(m));
    }

    let tools = req
        .tools
        .into_iter()
        .map(|t| CanonicalTool {
            name: t.function.name,
            description: t.function.description,
            parameters: t.function.parameters,
        })
        .collect();

    let tool_choice = req.tool_choice.map(|c| match c {
        ChatToolChoice::Mode(mode) => match mode.as_str() {
            "none" => CanonicalToolChoice::None,
            "required" => CanonicalToolChoice::Required,
            _ => CanonicalToolChoice::Auto,
        },
        ChatToolChoice::Named { function, .. } => CanonicalToolChoice::Named { name: function.name },
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
            max_tokens: req.max_tokens,
            stop: req.stop.map(|s| s.into_vec()).unwrap_or_default(),
        },
        stream: req.stream.unwrap_or(false),
        extra: None,
    })
}

fn chat_message_to_canonical(m: ChatMessage) -> CanonicalMessage {
    let role = match m.role.as_str() {
        "assistant" => CanonicalRole::Assistant,
        "tool" => CanonicalRole::Tool,
        _ => CanonicalRole::User,
    };

    let mut parts = Vec::new();
    if let Some(content) = m.content {
        match content {
            ChatMessageContent::Text(text) => {
                if !text.is_empty() || m.tool_calls.is_empty() {
                    parts.push(CanonicalPart::Text { text });
                }
            }
            ChatMessageContent::Parts(items) => {
                for part in items {
                    parts.push(match part {
                        ChatMessagePart::Text { text } => CanonicalPart::Text { text },
                        ChatMessagePart::ImageUrl { image_url } => CanonicalPart::Image {
                            mime: "image/*".to_string(),
                            source: image_url.url,
                        },
                        ChatMessagePart::InputAudio { input_audio } => CanonicalPart::Audio {
                            mime: format!("audio/{}", input_audio.format),
                            source: input_audio.data,
                        },
                    });
                }
            }
        }
    }

    for call in m.tool_calls {
        parts.push(CanonicalPart::ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: serde_json::from_str(&call.function.arguments).unwrap_or(Json::Null),
        });
    }

    if let Some(tool_call_id) = m.tool_call_id {
        let text = parts
            .iter()
            .find_map(|p| match p {
                CanonicalPart::Text { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();
        parts = vec![CanonicalPart::ToolResult {
            tool_call_id,
            content: text,
            is_error: false,
        }];
    }

    CanonicalMessage { role, parts }
}

pub fn from_canonical(req: &CanonicalRequest) -> Result<Json, TransformError> {
    let mut messages = Vec::new();
    if let Some(system) = &req.system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: Some(ChatMessageContent::Text(system.clone())),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        });
    }
    for m in &req.messages {
        messages.push(canonical_message_to_chat(m));
    }

    let tools = req
        .tools
        .iter()
        .map(|t| ChatToolDefinition {
            kind: "function".to_string(),
            function: novagate_protocol::openai::chat::ChatFunctionDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect();

    let tool_choice = req.tool_choice.as_ref().map(|c| match c {
        CanonicalToolChoice::Auto => ChatToolChoice::Mode("auto".to_string()),
        CanonicalToolChoice::None => ChatToolChoice::Mode("none".to_string()),
        CanonicalToolChoice::Required => ChatToolChoice::Mode("required".to_string()),
        CanonicalToolChoice::Named { name } => ChatToolChoice::Named {
            kind: "function".to_string(),
            function: novagate_protocol::openai::chat::ChatToolChoiceFunction { name: name.clone() },
        },
    });

    let out = ChatCompletionRequest {
        model: req.model.clone(),
        messages,
        temperature: req.sampling.temperature,
        top_p: req.sampling.top_p,
        max_tokens: req.sampling.max_tokens,
        stop: if req.sampling.stop.is_empty() {
            None
        } else {
            Some(novagate_protocol::openai::chat::StopSequences::Many(
                req.sampling.stop.clone(),
            ))
        },
        stream: Some(req.stream),
        tools,
        tool_choice,
    };
    serde_json::to_value(out).map_err(malformed)
}

fn canonical_message_to_chat(m: &CanonicalMessage) -> ChatMessage {
    let role = match m.role {
        CanonicalRole::Assistant => "assistant",
        CanonicalRole::Tool => "tool",
        CanonicalRole::User => "user",
    };

    if let Some(CanonicalPart::ToolResult {
        tool_call_id,
        content,
        ..
    }) = m.parts.first()
    {
        return ChatMessage {
            role: "tool".to_string(),
            content: Some(ChatMessageContent::Text(content.clone())),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.clone()),
        };
    }

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in &m.parts {
        match part {
            CanonicalPart::Text { text: t } => text.push_str(t),
            CanonicalPart::ToolCall { id, name, arguments } => {
                tool_calls.push(ChatToolCall {
                    id: id.clone(),
                    kind: "function".to_string(),
                    function: ChatToolCallFunction {
                        name: name.clone(),
                        arguments: arguments.to_string(),
                    },
                });
            }
            _ => {}
        }
    }

    ChatMessage {
        role: role.to_string(),
        content: if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(ChatMessageContent::Text(text))
        },
        name: None,
        tool_calls,
        tool_call_id: None,
    }
}

pub fn response_to_snapshot(body: &Json) -> Result<CanonicalSnapshot, TransformError> {
    let resp: ChatCompletionResponse = serde_json::from_value(body.clone()).map_err(malformed)?;
    let choice: ChatChoice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| TransformError::UnsupportedContent {
            family: ApiFamily::Chat,
            reason: "response has no choices".to_string(),
        })?;

    let mut snapshot = CanonicalSnapshot::default();
    if let Some(ChatMessageContent::Text(text)) = choice.message.content {
        snapshot.text = text;
    }
    for call in choice.message.tool_calls {
        snapshot.tool_calls.push(novagate_protocol::canonical::CanonicalToolCall {
            id: call.id,
            name: call.function.name,
            arguments_json: call.function.arguments,
        });
    }
    snapshot.finish_reason = choice.finish_reason.as_deref().map(map_finish_reason_in);
    if let Some(usage) = resp.usage {
        snapshot.usage = Some(novagate_protocol::canonical::CanonicalUsage {
            prompt_tokens: Some(usage.prompt_tokens),
            completion_tokens: Some(usage.completion_tokens),
            cached_tokens: usage.prompt_tokens_details.map(|d| d.cached_tokens),
            cache_write_tokens: None,
        });
    }
    Ok(snapshot)
}

pub fn snapshot_to_response(snapshot: &CanonicalSnapshot) -> Result<Json, TransformError> {
    let tool_calls = snapshot
        .tool_calls
        .iter()
        .map(|c| ChatToolCall {
            id: c.id.clone(),
            kind: "function".to_string(),
            function: ChatToolCallFunction {
                name: c.name.clone(),
                arguments: c.arguments_json.clone(),
            },
        })
        .collect::<Vec<_>>();

    let resp = ChatCompletionResponse {
        id: tool_calls::synthesize_id("chatcmpl"),
        object: "chat.completion".to_string(),
        created: 0,
        model: String::new(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: if snapshot.text.is_empty() {
                    None
                } else {
                    Some(ChatMessageContent::Text(snapshot.text.clone()))
                },
                name: None,
                tool_calls,
                tool_call_id: None,
            },
            finish_reason: snapshot.finish_reason.map(map_finish_reason_out),
        }],
        usage: snapshot.usage.as_ref().map(|u| novagate_protocol::openai::chat::ChatUsage {
            prompt_tokens: u.prompt_tokens.unwrap_or_default(),
            completion_tokens: u.completion_tokens.unwrap_or_default(),
            total_tokens: u.prompt_tokens.unwrap_or_default() + u.completion_tokens.unwrap_or_default(),
            prompt_tokens_details: u.cached_tokens.map(|c| novagate_protocol::openai::chat::ChatPromptTokenDetails {
                cached_tokens: c,
            }),
        }),
    };
    serde_json::to_value(resp).map_err(malformed)
}

fn map_finish_reason_in(s: &str) -> CanonicalFinishReason {
    match s {
        "length" => CanonicalFinishReason::Length,
        "tool_calls" => CanonicalFinishReason::ToolCalls,
        "content_filter" => CanonicalFinishReason::ContentFilter,
        _ => CanonicalFinishReason::Stop,
    }
}

fn map_finish_reason_out(r: CanonicalFinishReason) -> String {
    match r {
        CanonicalFinishReason::Stop => "stop",
        CanonicalFinishReason::Length => "length",
        CanonicalFinishReason::ToolCalls => "tool_calls",
        CanonicalFinishReason::ContentFilter => "content_filter",
        CanonicalFinishReason::Error => "stop",
    }
    .to_string()
}

/// Decodes one SSE `data:` payload of a chat-completions stream into
/// canonical deltas. `tool_index_ids` tracks the synthetic ids assigned to
/// tool calls keyed by their `index`, since chunks only repeat the real id
/// on the first delta for each call.
pub fn decode_stream_chunk(
    data: &str,
    tool_index_ids: &mut std::collections::HashMap<u32, String>,
) -> Result<Vec<CanonicalDelta>, TransformError> {
    if data == "[DONE]" {
        return Ok(Vec::new());
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(malformed)?;
    let mut deltas = Vec::new();
    for choice in chunk.choices {
        deltas.extend(chunk_delta_to_canonical(choice.delta, tool_index_ids));
        if let Some(reason) = choice.finish_reason {
            deltas.push(CanonicalDelta::Finish {
                reason: map_finish_reason_in(&reason),
            });
        }
    }
    if let Some(usage) = chunk.usage {
        deltas.push(CanonicalDelta::Usage {
            usage: novagate_protocol::canonical::CanonicalUsage {
                prompt_tokens: Some(usage.prompt_tokens),
                completion_tokens: Some(usage.completion_tokens),
                cached_tokens: usage.prompt_tokens_details.map(|d| d.cached_tokens),
                cache_write_tokens: None,
            },
        });
    }
    Ok(deltas)
}

fn chunk_delta_to_canonical(
    delta: ChatChunkDelta,
    tool_index_ids: &mut std::collections::HashMap<u32, String>,
) -> Vec<CanonicalDelta> {
    let mut out = Vec::new();
    if let Some(content) = delta.content {
        out.push(CanonicalDelta::TextDelta { text: content });
    }
    for call in delta.tool_calls {
        emit_tool_call_delta(call, tool_index_ids, &mut out);
    }
    out
}

fn emit_tool_call_delta(
    call: ChatChunkToolCall,
    tool_index_ids: &mut std::collections::HashMap<u32, String>,
    out: &mut Vec<CanonicalDelta>,
) {
    let id = if let Some(id) = call.id.clone() {
        tool_index_ids.insert(call.index, id.clone());
        out.push(CanonicalDelta::ToolCallStart {
            id: id.clone(),
            name: call
                .function
                .as_ref()
                .and_then(|f| f.name.clone())
                .unwrap_or_default(),
        });
        id
    } else {
        match tool_index_ids.get(&call.index) {
            Some(id) => id.clone(),
            None => return,
        }
    };
    if let Some(ChatChunkToolCallFunction {
        arguments: Some(partial),
        ..
    }) = call.function
    {
        out.push(CanonicalDelta::ToolCallArgumentsDelta {
            id,
            partial_json: partial,
        });
    }
}

/// Re-encodes canonical deltas as chat-completions chunk JSON values, one
/// value per input delta that produces wire output (usage/finish deltas
/// may fold into the same chunk a caller already emitted).
pub fn encode_deltas(id: &str, model: &str, deltas: &[CanonicalDelta]) -> Vec<Json> {
    let mut out = Vec::new();
    for delta in deltas {
        let chunk_delta = match delta {
            CanonicalDelta::TextDelta { text } => ChatChunkDelta {
                content: Some(text.clone()),
                ..Default::default()
            },
            CanonicalDelta::ToolCallStart { id, name } => ChatChunkDelta {
                tool_calls: vec![ChatChunkToolCall {
                    index: 0,
                    id: Some(id.clone()),
                    function: Some(ChatChunkToolCallFunction {
                        name: Some(name.clone()),
                        arguments: Some(String::new()),
                    }),
                }],
                ..Default::default()
            },
            CanonicalDelta::ToolCallArgumentsDelta { partial_json, .. } => ChatChunkDelta {
                tool_calls: vec![ChatChunkToolCall {
                    index: 0,
                    id: None,
                    function: Some(ChatChunkToolCallFunction {
                        name: None,
                        arguments: Some(partial_json.clone()),
                    }),
                }],
                ..Default::default()
            },
            _ => continue,
        };
        let finish_reason = match delta {
            CanonicalDelta::Finish { reason } => Some(map_finish_reason_out(*reason)),
            _ => None,
        };
        out.push(
            serde_json::to_value(ChatCompletionChunk {
                id: id.to_string(),
                object: "chat.completion.chunk".to_string(),
                created: 0,
                model: model.to_string(),
                choices: vec![ChatChunkChoice {
                    index: 0,
                    delta: chunk_delta,
                    finish_reason,
                }],
                usage: None,
            })
            .expect("chat chunk always serializes"),
        );
    }
    out
}
