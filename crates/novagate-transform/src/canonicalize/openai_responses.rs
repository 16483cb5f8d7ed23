use novagate_protocol::canonical::{
    CanonicalDelta, CanonicalFinishReason, CanonicalMessage, CanonicalPart, CanonicalRequest,
    CanonicalRole, CanonicalSnapshot, CanonicalTool, CanonicalToolChoice, CanonicalToolCall,
    CanonicalUsage, SamplingParams,
};
use novagate_protocol::openai::chat::{ChatToolChoice, ChatToolDefinition, ChatUsage};
use novagate_protocol::openai::{
    ResponseContentPart, ResponseInputItem, ResponseObject, ResponseOutputItem,
    ResponseStreamEvent, ResponsesRequest,
};
use novagate_protocol::ApiFamily;
use serde_json::Value as Json;

use crate::error::TransformError;
use crate::tool_calls;

fn malformed(e: serde_json::Error) -> TransformError {
    TransformError::Malformed {
        family: ApiFamily::Responses,
        source: e,
    }
}

pub fn to_canonical(body: &Json) -> Result<CanonicalRequest, TransformError> {
    let req: ResponsesRequest = serde_json::from_value(body.clone()).map_err(malformed)?;

    let mut messages = Vec::new();
    for item in req.input {
        match item {
            ResponseInputItem::Message { role, content } => {
                let canonical_role = if role == "assistant" {
                    CanonicalRole::Assistant
                } else {
                    CanonicalRole::User
                };
                messages.push(CanonicalMessage {
                    role: canonical_role,
                    parts: content.into_iter().map(input_part_to_canonical).collect(),
                });
            }
            ResponseInputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => {
                messages.push(CanonicalMessage {
                    role: CanonicalRole::Assistant,
                    parts: vec![CanonicalPart::ToolCall {
                        id: call_id,
                        name,
                        arguments: serde_json::from_str(&arguments).unwrap_or(Json::Null),
                    }],
                });
            }
            ResponseInputItem::FunctionCallOutput { call_id, output } => {
                messages.push(CanonicalMessage {
                    role: CanonicalRole::Tool,
                    parts: vec![CanonicalPart::ToolResult {
                        tool_call_id: call_id,
                        content: output,
                        is_error: false,
                    }],
                });
            }
        }
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
        system: req.instructions,
        messages,
        tools,
        tool_choice,
        sampling: SamplingParams {
            temperature: req.temperature,
            top_p: req.top_p,
            max_tokens: req.max_output_tokens,
            stop: Vec::new(),
        },
        stream: req.stream.unwrap_or(false),
        extra: None,
    })
}

fn input_part_to_canonical(p: ResponseContentPart) -> CanonicalPart {
    match p {
        ResponseContentPart::InputText { text } | ResponseContentPart::OutputText { text } => {
            CanonicalPart::Text { text }
        }
        ResponseContentPart::InputImage { image_url } => CanonicalPart::Image {
            mime: "image/*".to_string(),
            source: image_url,
        },
    }
}

pub fn from_canonical(req: &CanonicalRequest) -> Result<Json, TransformError> {
    let mut input = Vec::new();
    for m in &req.messages {
        let role = match m.role {
            CanonicalRole::Assistant => "assistant",
            _ => "user",
        };
        let mut content = Vec::new();
        for part in &m.parts {
            match part {
                CanonicalPart::Text { text } => {
                    content.push(if role == "assistant" {
                        ResponseContentPart::OutputText { text: text.clone() }
                    } else {
                        ResponseContentPart::InputText { text: text.clone() }
                    });
                }
                CanonicalPart::Image { source, .. } => {
                    content.push(ResponseContentPart::InputImage {
                        image_url: source.clone(),
                    });
                }
                CanonicalPart::ToolCall { id, name, arguments } => {
                    input.push(ResponseInputItem::FunctionCall {
                        call_id: id.clone(),
                        name: name.clone(),
                        arguments: arguments.to_string(),
                    });
                }
                CanonicalPart::ToolResult {
                    tool_call_id,
                    content: c,
                    ..
                } => {
                    input.push(ResponseInputItem::FunctionCallOutput {
                        call_id: tool_call_id.clone(),
                        output: c.clone(),
                    });
                }
                _ => {}
            }
        }
        if !content.is_empty() {
            input.push(ResponseInputItem::Message {
                role: role.to_string(),
                content,
            });
        }
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

    let out = ResponsesRequest {
        model: req.model.clone(),
        input,
        instructions: req.system.clone(),
        temperature: req.sampling.temperature,
        top_p: req.sampling.top_p,
        max_output_tokens: req.sampling.max_tokens,
        stream: Some(req.stream),
        tools,
        tool_choice,
    };
    serde_json::to_value(out).map_err(malformed)
}

pub fn response_to_snapshot(body: &Json) -> Result<CanonicalSnapshot, TransformError> {
    let resp: ResponseObject = serde_json::from_value(body.clone()).map_err(malformed)?;
    let mut snapshot = CanonicalSnapshot::default();
    for item in resp.output {
        match item {
            ResponseOutputItem::Message { content, .. } => {
                for part in content {
                    if let ResponseContentPart::OutputText { text } = part {
                        snapshot.text.push_str(&text);
                    }
                }
            }
            ResponseOutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => {
                snapshot.tool_calls.push(CanonicalToolCall {
                    id: call_id,
                    name,
                    arguments_json: arguments,
                });
            }
        }
    }
    snapshot.finish_reason = Some(match resp.status.as_str() {
        "incomplete" => CanonicalFinishReason::Length,
        _ if !snapshot.tool_calls.is_empty() => CanonicalFinishReason::ToolCalls,
        _ => CanonicalFinishReason::Stop,
    });
    if let Some(usage) = resp.usage {
        snapshot.usage = Some(usage_to_canonical(usage));
    }
    Ok(snapshot)
}

fn usage_to_canonical(usage: ChatUsage) -> CanonicalUsage {
    CanonicalUsage {
        prompt_tokens: Some(usage.prompt_tokens),
        completion_tokens: Some(usage.completion_tokens),
        cached_tokens: usage.prompt_tokens_details.map(|d| d.cached_tokens),
        cache_write_tokens: None,
    }
}

pub fn snapshot_to_response(snapshot: &CanonicalSnapshot) -> Result<Json, TransformError> {
    let mut output = Vec::new();
    if !snapshot.text.is_empty() {
        output.push(ResponseOutputItem::Message {
            id: tool_calls::synthesize_id("msg"),
            role: "assistant".to_string(),
            content: vec![ResponseContentPart::OutputText {
                text: snapshot.text.clone(),
            }],
        });
    }
    for call in &snapshot.tool_calls {
        output.push(ResponseOutputItem::FunctionCall {
            id: tool_calls::synthesize_id("fc"),
            call_id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments_json.clone(),
        });
    }

    let out = ResponseObject {
        id: tool_calls::synthesize_id("resp"),
        object: "response".to_string(),
        created_at: 0,
        model: String::new(),
        status: "completed".to_string(),
        output,
        usage: snapshot.usage.as_ref().map(|u| ChatUsage {
            prompt_tokens: u.prompt_tokens.unwrap_or_default(),
            completion_tokens: u.completion_tokens.unwrap_or_default(),
            total_tokens: u.prompt_tokens.unwrap_or_default() + u.completion_tokens.unwrap_or_default(),
            prompt_tokens_details: u.cached_tokens.map(|c| novagate_protocol::openai::chat::ChatPromptTokenDetails {
                cached_tokens: c,
            }),
        }),
    };
    serde_json::to_value(out).map_err(malformed)
}

/// Decodes one named SSE event of a Responses-API stream into canonical
/// deltas.
pub fn decode_stream_event(_event: &str, data: &str) -> Result<Vec<CanonicalDelta>, TransformError> {
    let parsed: ResponseStreamEvent = serde_json::from_str(data).map_err(malformed)?;
    Ok(match parsed {
        ResponseStreamEvent::Created { .. } => vec![CanonicalDelta::MessageStart],
        ResponseStreamEvent::OutputTextDelta { delta, .. } => {
            vec![CanonicalDelta::TextDelta { text: delta }]
        }
        ResponseStreamEvent::FunctionCallArgumentsDelta { item_id, delta } => {
            vec![CanonicalDelta::ToolCallArgumentsDelta {
                id: item_id,
                partial_json: delta,
            }]
        }
        ResponseStreamEvent::OutputItemDone {
            item: ResponseOutputItem::FunctionCall { call_id, name, .. },
        } => vec![
            CanonicalDelta::ToolCallStart { id: call_id.clone(), name },
            CanonicalDelta::ToolCallEnd { id: call_id },
        ],
        ResponseStreamEvent::OutputItemDone { .. } => Vec::new(),
        ResponseStreamEvent::Completed { response } => {
            let mut out = Vec::new();
            if let Some(usage) = response.usage {
                out.push(CanonicalDelta::Usage {
                    usage: usage_to_canonical(usage),
                });
            }
            out.push(CanonicalDelta::Finish {
                reason: CanonicalFinishReason::Stop,
            });
            out
        }
        ResponseStreamEvent::Error { .. } => vec![CanonicalDelta::Finish {
            reason: CanonicalFinishReason::Error,
        }],
    })
}

pub fn encode_deltas(id: &str, deltas: &[CanonicalDelta]) -> Vec<(&'static str, Json)> {
    let mut out = Vec::new();
    for delta in deltas {
        let (event, value) = match delta {
            CanonicalDelta::TextDelta { text } => (
                "response.output_text.delta",
                ResponseStreamEvent::OutputTextDelta {
                    item_id: id.to_string(),
                    delta: text.clone(),
                },
            ),
            CanonicalDelta::ToolCallArgumentsDelta { id: call_id, partial_json } => (
                "response.function_call_arguments.delta",
                ResponseStreamEvent::FunctionCallArgumentsDelta {
                    item_id: call_id.clone(),
                    delta: partial_json.clone(),
                },
            ),
            _ => continue,
        };
        out.push((event, serde_json::to_value(value).expect("responses stream event always serializes")));
    }
    out
}
