mod claude;
mod gemini;
mod openai_chat;
mod openai_responses;

use novagate_protocol::canonical::{CanonicalRequest, CanonicalSnapshot};
use novagate_protocol::ApiFamily;
use serde_json::Value as Json;

use crate::error::TransformError;

pub fn to_canonical_request(family: ApiFamily, body: &Json) -> Result<CanonicalRequest, TransformError> {
    match family {
        ApiFamily::Chat => openai_chat::to_canonical(body),
        ApiFamily::Responses => openai_responses::to_canonical(body),
        ApiFamily::Messages => claude::to_canonical(body),
        ApiFamily::Gemini => gemini::to_canonical(body),
        other => Err(TransformError::NotGenerateContent(other)),
    }
}

pub fn from_canonical_request(family: ApiFamily, req: &CanonicalRequest) -> Result<Json, TransformError> {
    match family {
        ApiFamily::Chat => openai_chat::from_canonical(req),
        ApiFamily::Responses => openai_responses::from_canonical(req),
        ApiFamily::Messages => claude::from_canonical(req),
        ApiFamily::Gemini => gemini::from_canonical(req),
        other => Err(TransformError::NotGenerateContent(other)),
    }
}

pub fn response_to_snapshot(family: ApiFamily, body: &Json) -> Result<CanonicalSnapshot, TransformError> {
    match family {
        ApiFamily::Chat => openai_chat::response_to_snapshot(body),
        ApiFamily::Responses => openai_responses::response_to_snapshot(body),
        ApiFamily::Messages => claude::response_to_snapshot(body),
        ApiFamily::Gemini => gemini::response_to_snapshot(body),
        other => Err(TransformError::NotGenerateContent(other)),
    }
}

pub fn snapshot_to_response(family: ApiFamily, snapshot: &CanonicalSnapshot) -> Result<Json, TransformError> {
    match family {
        ApiFamily::Chat => openai_chat::snapshot_to_response(snapshot),
        ApiFamily::Responses => openai_responses::snapshot_to_response(snapshot),
        ApiFamily::Messages => claude::snapshot_to_response(snapshot),
        ApiFamily::Gemini => gemini::snapshot_to_response(snapshot),
        other => Err(TransformError::NotGenerateContent(other)),
    }
}

pub(crate) use claude::decode_stream_event as claude_decode_stream_event;
pub(crate) use gemini::decode_stream_chunk as gemini_decode_stream_chunk;
pub(crate) use openai_chat::decode_stream_chunk as openai_chat_decode_stream_chunk;
pub(crate) use openai_responses::decode_stream_event as openai_responses_decode_stream_event;

pub(crate) use claude::encode_deltas as claude_encode_deltas;
pub(crate) use gemini::encode_deltas as gemini_encode_deltas;
pub(crate) use openai_chat::encode_deltas as openai_chat_encode_deltas;
pub(crate) use openai_responses::encode_deltas as openai_responses_encode_deltas;
