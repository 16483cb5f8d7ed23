use std::collections::HashMap;

use novagate_protocol::canonical::{CanonicalDelta, CanonicalSnapshot};
use novagate_protocol::sse::SseParser;
use novagate_protocol::ApiFamily;

use crate::canonicalize;
use crate::error::TransformError;

/// Per-source decode state. Each family needs different bookkeeping to turn
/// its own incremental wire shape into canonical deltas; keeping it behind
/// one enum means `StreamTransformer` doesn't grow a new struct field for
/// every family added.
enum DecodeState {
    OpenAiChat { tool_index_ids: HashMap<u32, String> },
    OpenAiResponses,
    Claude { index_ids: HashMap<u32, String> },
    Gemini { seen_tool_calls: HashMap<String, String>, text_emitted: usize },
}

impl DecodeState {
    fn new(family: ApiFamily) -> Self {
        match family {
            ApiFamily::Chat => DecodeState::OpenAiChat {
                tool_index_ids: HashMap::new(),
            },
            ApiFamily::Responses => DecodeState::OpenAiResponses,
            ApiFamily::Messages => DecodeState::Claude {
                index_ids: HashMap::new(),
            },
            ApiFamily::Gemini => DecodeState::Gemini {
                seen_tool_calls: HashMap::new(),
                text_emitted: 0,
            },
            other => unreachable!("{other:?} has no stream decode state"),
        }
    }
}

/// Folds a source family's incremental wire events into canonical deltas,
/// then re-encodes them in the destination family's own streaming shape.
///
/// Streams only ever flow through generate-content families; specialized
/// families (EMB, TRN, SPC, IMG) are buffered-only and never construct one
/// of these.
pub struct StreamTransformer {
    src: ApiFamily,
    dst: ApiFamily,
    parser: SseParser,
    decode: DecodeState,
    response_id: String,
    model: String,
    accum: CanonicalSnapshot,
    gemini_encode_accum: CanonicalSnapshot,
}

impl StreamTransformer {
    pub fn new(src: ApiFamily, dst: ApiFamily, model: &str) -> Self {
        Self {
            src,
            dst,
            parser: SseParser::new(),
            decode: DecodeState::new(src),
            response_id: crate::tool_calls::synthesize_id("stream"),
            model: model.to_string(),
            accum: CanonicalSnapshot::default(),
            gemini_encode_accum: CanonicalSnapshot::default(),
        }
    }

    /// Feeds one chunk of upstream bytes, returning bytes already framed
    /// for the destination family's own stream wire format.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>, TransformError> {
        let events = self.parser.push_bytes(&bytes::Bytes::copy_from_slice(chunk));
        let mut out = Vec::new();
        for event in events {
            let deltas = self.decode_event(event.event.as_deref(), &event.data)?;
            for delta in &deltas {
                self.accum.apply(delta);
            }
            out.extend(self.encode_deltas(&deltas));
        }
        Ok(out)
    }

    /// Flushes the parser and, if the upstream connection dropped mid
    /// tool-call, synthesises a truncation finish so the client sees a
    /// terminal event instead of hanging.
    pub fn close(&mut self) -> Result<Vec<u8>, TransformError> {
        let mut out = Vec::new();
        for event in self.parser.finish() {
            let deltas = self.decode_event(event.event.as_deref(), &event.data)?;
            for delta in &deltas {
                self.accum.apply(delta);
            }
            out.extend(self.encode_deltas(&deltas));
        }
        if self.accum.finish_reason.is_none() && !self.accum.incomplete_tool_calls().is_empty() {
            self.accum.truncated = true;
            let deltas = vec![CanonicalDelta::Finish {
                reason: novagate_protocol::canonical::CanonicalFinishReason::Error,
            }];
            out.extend(self.encode_deltas(&deltas));
        }
        Ok(out)
    }

    /// The canonical snapshot accumulated so far from every delta fed in;
    /// used after the stream ends to derive usage and truncation for the
    /// request's usage record.
    pub fn snapshot(&self) -> &CanonicalSnapshot {
        &self.accum
    }

    fn decode_event(&mut self, event: Option<&str>, data: &str) -> Result<Vec<CanonicalDelta>, TransformError> {
        match (&mut self.decode, self.src) {
            (DecodeState::OpenAiChat { tool_index_ids }, ApiFamily::Chat) => {
                canonicalize::openai_chat_decode_stream_chunk(data, tool_index_ids)
            }
            (DecodeState::OpenAiResponses, ApiFamily::Responses) => {
                canonicalize::openai_responses_decode_stream_event(event.unwrap_or(""), data)
            }
            (DecodeState::Claude { index_ids }, ApiFamily::Messages) => {
                canonicalize::claude_decode_stream_event(data, index_ids)
            }
            (DecodeState::Gemini { seen_tool_calls, text_emitted }, ApiFamily::Gemini) => {
                canonicalize::gemini_decode_stream_chunk(data, seen_tool_calls, text_emitted)
            }
            _ => unreachable!("decode state family must match stream source"),
        }
    }

    fn encode_deltas(&mut self, deltas: &[CanonicalDelta]) -> Vec<u8> {
        match self.dst {
            ApiFamily::Chat => {
                let chunks = canonicalize::openai_chat_encode_deltas(&self.response_id, &self.model, deltas);
                frame_sse_data_only(&chunks)
            }
            ApiFamily::Responses => {
                let events = canonicalize::openai_responses_encode_deltas(&self.response_id, deltas);
                frame_sse_named(events.into_iter().map(|(name, v)| (Some(name), v)))
            }
            ApiFamily::Messages => {
                let events = canonicalize::claude_encode_deltas(deltas);
                frame_sse_named(events)
            }
            ApiFamily::Gemini => {
                let chunks = canonicalize::gemini_encode_deltas(deltas, &mut self.gemini_encode_accum);
                frame_sse_data_only(&chunks)
            }
            other => unreachable!("{other:?} has no stream encoding"),
        }
    }
}

fn frame_sse_data_only(values: &[serde_json::Value]) -> Vec<u8> {
    let mut out = String::new();
    for v in values {
        out.push_str("data: ");
        out.push_str(&v.to_string());
        out.push_str("\n\n");
    }
    out.into_bytes()
}

fn frame_sse_named<I>(events: I) -> Vec<u8>
where
    I: IntoIterator<Item = (Option<&'static str>, serde_json::Value)>,
{
    let mut out = String::new();
    for (event, value) in events {
        if let Some(name) = event {
            out.push_str("event: ");
            out.push_str(name);
            out.push('\n');
        }
        out.push_str("data: ");
        out.push_str(&value.to_string());
        out.push_str("\n\n");
    }
    out.into_bytes()
}
