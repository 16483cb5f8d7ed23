use novagate_protocol::ApiFamily;
use serde_json::json;

use crate::{transcode_request, transcode_response, StreamTransformer};

#[test]
fn chat_system_message_becomes_claude_top_level_system() {
    let chat_body = json!({
        "model": "gpt-4o",
        "messages": [
            { "role": "system", "content": "be terse" },
            { "role": "user", "content": "hi" }
        ]
    });
    let claude_body = transcode_request(ApiFamily::Chat, ApiFamily::Messages, &chat_body).unwrap();
    assert_eq!(claude_body["system"], "be terse");
    assert_eq!(claude_body["messages"].as_array().unwrap().len(), 1);
}

#[test]
fn gemini_system_instruction_round_trips_into_chat_system_message() {
    let gemini_body = json!({
        "systemInstruction": { "parts": [{ "text": "be terse" }] },
        "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }],
    });
    let chat_body = transcode_request(ApiFamily::Gemini, ApiFamily::Chat, &gemini_body).unwrap();
    let messages = chat_body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "be terse");
}

#[test]
fn tool_call_survives_chat_to_claude_and_back() {
    let chat_body = json!({
        "model": "gpt-4o",
        "messages": [
            { "role": "user", "content": "what's the weather in Paris?" },
            {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "get_weather", "arguments": "{\"city\":\"Paris\"}" }
                }]
            },
            { "role": "tool", "tool_call_id": "call_1", "content": "18C, cloudy" }
        ]
    });

    let claude_body = transcode_request(ApiFamily::Chat, ApiFamily::Messages, &chat_body).unwrap();
    let messages = claude_body["messages"].as_array().unwrap();
    let tool_use = &messages[1]["content"][0];
    assert_eq!(tool_use["type"], "tool_use");
    assert_eq!(tool_use["id"], "call_1");
    assert_eq!(tool_use["name"], "get_weather");

    let tool_result = &messages[2]["content"][0];
    assert_eq!(tool_result["type"], "tool_result");
    assert_eq!(tool_result["tool_use_id"], "call_1");

    let back_to_chat = transcode_request(ApiFamily::Messages, ApiFamily::Chat, &claude_body).unwrap();
    let back_messages = back_to_chat["messages"].as_array().unwrap();
    assert_eq!(back_messages[1]["tool_calls"][0]["id"], "call_1");
    assert_eq!(back_messages[2]["tool_call_id"], "call_1");
}

#[test]
fn response_transcode_preserves_finish_reason_and_text() {
    let claude_response = json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "model": "claude-3",
        "content": [{ "type": "text", "text": "hello there" }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 10, "output_tokens": 3 }
    });
    let chat_response = transcode_response(ApiFamily::Messages, ApiFamily::Chat, &claude_response).unwrap();
    assert_eq!(chat_response["choices"][0]["message"]["content"], "hello there");
    assert_eq!(chat_response["choices"][0]["finish_reason"], "stop");
    assert_eq!(chat_response["usage"]["prompt_tokens"], 10);
}

#[test]
fn stream_truncated_mid_tool_call_synthesizes_error_finish() {
    let mut xform = StreamTransformer::new(ApiFamily::Chat, ApiFamily::Messages, "gpt-4o");

    let chunk1 = concat!(
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":0,\"model\":\"gpt-4o\",",
        "\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",",
        "\"function\":{\"name\":\"get_weather\",\"arguments\":\"{\\\"city\\\":\"}}]},\"finish_reason\":null}]}\n\n",
    );
    xform.feed(chunk1.as_bytes()).unwrap();

    let closing = xform.close().unwrap();
    let closing_text = String::from_utf8(closing).unwrap();
    assert!(closing_text.contains("error"));
}
