//! The canonical intermediate representation every generate-content
//! transcode routes through. `novagate-transform` converts
//! `{Chat,Responses,Messages,Gemini}` wire bodies to and from this shape;
//! `transcode_request(src, dst)` is `to_wire(dst, to_canonical(src, body))`.

mod request;
mod response;

pub use request::{
    CanonicalMessage, CanonicalPart, CanonicalRequest, CanonicalRole, CanonicalTool,
    CanonicalToolChoice, SamplingParams, ToolCallRef,
};
pub use response::{
    CanonicalDelta, CanonicalFinishReason, CanonicalSnapshot, CanonicalToolCall, CanonicalUsage,
};
