use bytes::Bytes;

use crate::headers::Headers;
use crate::provider::ByteStream;

#[derive(Debug)]
pub enum ProxyResponse {
    Json {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
    Stream {
        status: u16,
        headers: Headers,
        body: StreamBody,
    },
}

#[derive(Debug)]
pub struct StreamBody {
    pub content_type: &'static str,
    pub stream: ByteStream,
}

impl StreamBody {
    pub fn new(content_type: &'static str, stream: ByteStream) -> Self {
        Self { content_type, stream }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamPassthroughError {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl UpstreamPassthroughError {
    pub fn new(status: u16, headers: Headers, body: Bytes) -> Self {
        Self { status, headers, body }
    }

    pub fn from_status(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<Bytes>) -> Self {
        Self::from_status(503, message)
    }
}
