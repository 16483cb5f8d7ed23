use std::collections::HashMap;

use novagate_protocol::canonical::{
    CanonicalDelta, CanonicalFinishReason, CanonicalMessage, CanonicalPart, CanonicalRequest,
    CanonicalRole, CanonicalSnapshot, CanonicalTool, CanonicalToolChoice, CanonicalToolCall,
    CanonicalUsage, SamplingParams,
};
use novagate_protocol::gemini::{
    GeminiCandidate, GeminiContent, GeminiFunctionCall, GeminiFunctionCallingConfig,
    GeminiFunctionDeclaration, GeminiFunctionResponse, GeminiGenerateContentRequest,
    GeminiGenerateContentResponse, GeminiGenerationConfig, GeminiInlineData, GeminiPart,
    GeminiTool, GeminiToolConfig, GeminiUsageMetadata,
};
use novagate_protocol::ApiFamily;
use serde_json::Value as Json;

use crate::error::TransformError;
use crate::tool_calls;

fn malformed(e: serde_json::Error) -> TransformError {
    TransformError::Malformed {
        family: ApiFamily::Gemini,
        source: e,
    }
}

pub fn to_canonical(body: &Json) -> Result<CanonicalRequest, TransformError> {
    let req: GeminiGenerateContentRequest = serde_json::from_value(body.clone()).map_err(malformed)?;

    let system = req
        .system_instruction
        .map(|c| parts_to_text(&c.parts));

    let messages = req.contents.into_iter().map(gemini_content_to_canonical).collect();

    let tools = req
        .tools
        .into_iter()
        .flat_map(|t| t.function_declarations)
        .map(|f| CanonicalTool {
            name: f.name,
            description: f.description,
            parameters: f.parameters,
        })
        .collect();

    let tool_choice = req.tool_config.map(|c| match c.function_calling_config.mode.as_str() {
        "NONE" => CanonicalToolChoice::None,
        "ANY" => CanonicalToolChoice::Required,
        _ => CanonicalToolChoice::Auto,
    });

    let (temperature, top_p, max_tokens, stop) = match req.generation_config {
        Some(g) => (g.temperature, g.top_p, g.max_output_tokens, g.stop_sequences),
        None => (None, None, None, Vec::new()),
    };

    Ok(CanonicalRequest {
        model: String::new(),
        system,
        messages,
        tools,
        tool_choice,
        sampling: SamplingParams {
            temperature,
            top_p,
            max_tokens,
            stop,
        },
        stream: false,
        extra: None,
    })
}

fn parts_to_text(parts: &[GeminiPart]) -> String {
    parts
        .iter()
        .filter_map(|p| p.text.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

fn gemini_content_to_canonical(c: GeminiContent) -> CanonicalMessage {
    let role = match c.role.as_deref() {
        Some("model") => CanonicalRole::Assistant,
        _ => CanonicalRole::User,
    };
    let parts = c.parts.into_iter().map(gemini_part_to_canonical).collect();
    CanonicalMessage { role, parts }
}

fn gemini_part_to_canonical(p: GeminiPart) -> CanonicalPart {
    if let Some(text) = p.text {
        return CanonicalPart::Text { text };
    }
    if let Some(data) = p.inline_data {
        return CanonicalPart::Image {
            mime: data.mime_type,
            source: data.data,
        };
    }
    if let Some(call) = p.function_call {
        let id = tool_calls::synthesize_id("gemini_call");
        return CanonicalPart::ToolCall {
            id,
            name: call.name,
            arguments: call.args,
        };
    }
    if let Some(resp) = p.function_response {
        return CanonicalPart::ToolResult {
            tool_call_id: resp.name,
            content: resp.response.to_string(),
            is_error: false,
        };
    }
    CanonicalPart::Text { text: String::new() }
}

pub fn from_canonical(req: &CanonicalRequest) -> Result<Json, TransformError> {
    let contents = req.messages.iter().map(canonical_message_to_gemini).collect();

    let system_instruction = req.system.as_ref().map(|s| GeminiContent {
        role: None,
        parts: vec![GeminiPart {
            text: Some(s.clone()),
            inline_data: None,
            function_call: None,
            function_response: None,
        }],
    });

    let tools = if req.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTool {
            function_declarations: req
                .tools
                .iter()
                .map(|t| GeminiFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    };

    let tool_config = req.tool_choice.as_ref().map(|c| {
        let (mode, allowed) = match c {
            CanonicalToolChoice::None => ("NONE".to_string(), Vec::new()),
            CanonicalToolChoice::Required => ("ANY".to_string(), Vec::new()),
            CanonicalToolChoice::Named { name } => ("ANY".to_string(), vec![name.clone()]),
            CanonicalToolChoice::Auto => ("AUTO".to_string(), Vec::new()),
        };
        GeminiToolConfig {
            function_calling_config: GeminiFunctionCallingConfig {
                mode,
                allowed_function_names: allowed,
            },
        }
    });

    let generation_config = Some(GeminiGenerationConfig {
        temperature: req.sampling.temperature,
        top_p: req.sampling.top_p,
        max_output_tokens: req.sampling.max_tokens,
        stop_sequences: req.sampling.stop.clone(),
    });

    let out = GeminiGenerateContentRequest {
        contents,
        system_instruction,
        tools,
        tool_config,
        generation_config,
    };
    serde_json::to_value(out).map_err(malformed)
}

fn canonical_message_to_gemini(m: &CanonicalMessage) -> GeminiContent {
    let role = match m.role {
        CanonicalRole::Assistant => Some("model".to_string()),
        _ => Some("user".to_string()),
    };
    let parts = m
        .parts
        .iter()
        .map(|part| match part {
            CanonicalPart::Text { text } => GeminiPart {
                text: Some(text.clone()),
                inline_data: None,
                function_call: None,
                function_response: None,
            },
            CanonicalPart::Image { mime, source } | CanonicalPart::File { mime, source, .. } => {
                GeminiPart {
                    text: None,
                    inline_data: Some(GeminiInlineData {
                        mime_type: mime.clone(),
                        data: source.clone(),
                    }),
                    function_call: None,
                    function_response: None,
                }
            }
            CanonicalPart::Audio { mime, source } => GeminiPart {
                text: None,
                inline_data: Some(GeminiInlineData {
                    mime_type: mime.clone(),
                    data: source.clone(),
                }),
                function_call: None,
                function_response: None,
            },
            CanonicalPart::ToolCall { name, arguments, .. } => GeminiPart {
                text: None,
                inline_data: None,
                function_call: Some(GeminiFunctionCall {
                    name: name.clone(),
                    args: arguments.clone(),
                }),
                function_response: None,
            },
            CanonicalPart::ToolResult {
                tool_call_id,
                content,
                ..
            } => GeminiPart {
                text: None,
                inline_data: None,
                function_call: None,
                function_response: Some(GeminiFunctionResponse {
                    name: tool_call_id.clone(),
                    response: serde_json::json!({ "result": content }),
                }),
            },
        })
        .collect();
    GeminiContent { role, parts }
}

pub fn response_to_snapshot(body: &Json) -> Result<CanonicalSnapshot, TransformError> {
    let resp: GeminiGenerateContentResponse = serde_json::from_value(body.clone()).map_err(malformed)?;
    let candidate: GeminiCandidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| TransformError::UnsupportedContent {
            family: ApiFamily::Gemini,
            reason: "response has no candidates".to_string(),
        })?;

    let mut snapshot = CanonicalSnapshot::default();
    for part in candidate.content.parts {
        if let Some(text) = part.text {
            snapshot.text.push_str(&text);
        } else if let Some(call) = part.function_call {
            snapshot.tool_calls.push(CanonicalToolCall {
                id: tool_calls::synthesize_id("gemini_call"),
                name: call.name,
                arguments_json: call.args.to_string(),
            });
        }
    }
    snapshot.finish_reason = candidate.finish_reason.as_deref().map(map_finish_reason_in);
    if let Some(usage) = resp.usage_metadata {
        snapshot.usage = Some(CanonicalUsage {
            prompt_tokens: Some(usage.prompt_token_count),
            completion_tokens: Some(usage.candidates_token_count),
            cached_tokens: usage.cached_content_token_count,
            cache_write_tokens: None,
        });
    }
    Ok(snapshot)
}

pub fn snapshot_to_response(snapshot: &CanonicalSnapshot) -> Result<Json, TransformError> {
    let mut parts = Vec::new();
    if !snapshot.text.is_empty() {
        parts.push(GeminiPart {
            text: Some(snapshot.text.clone()),
            inline_data: None,
            function_call: None,
            function_response: None,
        });
    }
    for call in &snapshot.tool_calls {
        parts.push(GeminiPart {
            text: None,
            inline_data: None,
            function_call: Some(GeminiFunctionCall {
                name: call.name.clone(),
                args: serde_json::from_str(&call.arguments_json).unwrap_or(Json::Null),
            }),
            function_response: None,
        });
    }

    let out = GeminiGenerateContentResponse {
        candidates: vec![GeminiCandidate {
            content: GeminiContent {
                role: Some("model".to_string()),
                parts,
            },
            finish_reason: snapshot.finish_reason.map(map_finish_reason_out),
            index: 0,
        }],
        usage_metadata: snapshot.usage.as_ref().map(|u| GeminiUsageMetadata {
            prompt_token_count: u.prompt_tokens.unwrap_or_default(),
            candidates_token_count: u.completion_tokens.unwrap_or_default(),
            total_token_count: u.prompt_tokens.unwrap_or_default() + u.completion_tokens.unwrap_or_default(),
            cached_content_token_count: u.cached_tokens,
        }),
        model_version: None,
    };
    serde_json::to_value(out).map_err(malformed)
}

fn map_finish_reason_in(s: &str) -> CanonicalFinishReason {
    match s {
        "MAX_TOKENS" => CanonicalFinishReason::Length,
        "SAFETY" | "RECITATION" => CanonicalFinishReason::ContentFilter,
        _ => CanonicalFinishReason::Stop,
    }
}

fn map_finish_reason_out(r: CanonicalFinishReason) -> String {
    match r {
        CanonicalFinishReason::Stop => "STOP",
        CanonicalFinishReason::Length => "MAX_TOKENS",
        CanonicalFinishReason::ToolCalls => "STOP",
        CanonicalFinishReason::ContentFilter => "SAFETY",
        CanonicalFinishReason::Error => "OTHER",
    }
    .to_string()
}

/// Gemini streams are newline-delimited `GenerateContentResponse` JSON
/// values (or SSE `data:` lines carrying the same shape under `alt=sse`),
/// never incremental deltas — each chunk is itself a full partial
/// candidate, so decoding diffs the accumulated text against what a
/// `CanonicalSnapshot` already holds.
pub fn decode_stream_chunk(
    data: &str,
    seen_tool_calls: &mut HashMap<String, String>,
    text_emitted: &mut usize,
) -> Result<Vec<CanonicalDelta>, TransformError> {
    let resp: GeminiGenerateContentResponse = serde_json::from_str(data).map_err(malformed)?;
    let mut out = Vec::new();
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Ok(out);
    };

    let mut full_text = String::new();
    for part in &candidate.content.parts {
        if let Some(text) = &part.text {
            full_text.push_str(text);
        }
    }
    if full_text.len() > *text_emitted {
        out.push(CanonicalDelta::TextDelta {
            text: full_text[*text_emitted..].to_string(),
        });
        *text_emitted = full_text.len();
    }

    for part in &candidate.content.parts {
        if let Some(call) = &part.function_call {
            if !seen_tool_calls.contains_key(&call.name) {
                let id = tool_calls::synthesize_id("gemini_call");
                seen_tool_calls.insert(call.name.clone(), id.clone());
                out.push(CanonicalDelta::ToolCallStart {
                    id: id.clone(),
                    name: call.name.clone(),
                });
                out.push(CanonicalDelta::ToolCallArgumentsDelta {
                    id,
                    partial_json: call.args.to_string(),
                });
            }
        }
    }

    if let Some(usage) = resp.usage_metadata {
        out.push(CanonicalDelta::Usage {
            usage: CanonicalUsage {
                prompt_tokens: Some(usage.prompt_token_count),
                completion_tokens: Some(usage.candidates_token_count),
                cached_tokens: usage.cached_content_token_count,
                cache_write_tokens: None,
            },
        });
    }
    if let Some(reason) = candidate.finish_reason {
        out.push(CanonicalDelta::Finish {
            reason: map_finish_reason_in(&reason),
        });
    }
    Ok(out)
}

pub fn encode_deltas(deltas: &[CanonicalDelta], accum: &mut CanonicalSnapshot) -> Vec<Json> {
    let mut touched = false;
    for delta in deltas {
        accum.apply(delta);
        if matches!(
            delta,
            CanonicalDelta::TextDelta { .. } | CanonicalDelta::ToolCallArgumentsDelta { .. }
        ) {
            touched = true;
        }
    }
    if !touched {
        return Vec::new();
    }
    match snapshot_to_response(accum) {
        Ok(v) => vec![v],
        Err(_) => Vec::new(),
    }
}
