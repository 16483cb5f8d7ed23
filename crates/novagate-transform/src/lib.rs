//! Transcodes request/response bodies between the four generate-content API
//! families (CHAT, RESP, MSG, GEM) through a shared canonical shape, and the
//! single-shape specialized families (EMB, TRN, SPC, IMG) header/body-only.
//!
//! A naive implementation hand-writes one module per ordered family pair —
//! twelve for four families. Every family instead converts to and from
//! `novagate_protocol::canonical` once, so adding a family costs one pair of
//! conversions, not one new arm per existing family.

mod canonicalize;
mod error;
mod stream;
#[cfg(test)]
mod tests;
mod tool_calls;
mod usage;

pub use error::TransformError;
pub use stream::StreamTransformer;
pub use usage::estimate_tokens;

use novagate_protocol::canonical::{CanonicalRequest, CanonicalSnapshot};
use novagate_protocol::ApiFamily;
use serde_json::Value as Json;

/// Converts a request body in `src`'s wire shape into one in `dst`'s wire
/// shape. A no-op when `src == dst`.
pub fn transcode_request(src: ApiFamily, dst: ApiFamily, body: &Json) -> Result<Json, TransformError> {
    if src == dst {
        return Ok(body.clone());
    }
    let canonical = canonicalize::to_canonical_request(src, body)?;
    canonicalize::from_canonical_request(dst, &canonical)
}

/// Converts a buffered (non-streamed) response body from `src` to `dst`.
pub fn transcode_response(src: ApiFamily, dst: ApiFamily, body: &Json) -> Result<Json, TransformError> {
    if src == dst {
        return Ok(body.clone());
    }
    let snapshot = canonicalize::response_to_snapshot(src, body)?;
    canonicalize::snapshot_to_response(dst, &snapshot)
}

/// Re-exported so callers that already built a `CanonicalRequest` (e.g. the
/// Dispatcher rewriting `model` before encoding) can skip the request side
/// of `to_canonical` entirely.
pub fn encode_request(dst: ApiFamily, canonical: &CanonicalRequest) -> Result<Json, TransformError> {
    canonicalize::from_canonical_request(dst, canonical)
}

pub fn decode_request(src: ApiFamily, body: &Json) -> Result<CanonicalRequest, TransformError> {
    canonicalize::to_canonical_request(src, body)
}

pub fn snapshot_to_response(dst: ApiFamily, snapshot: &CanonicalSnapshot) -> Result<Json, TransformError> {
    canonicalize::snapshot_to_response(dst, snapshot)
}
