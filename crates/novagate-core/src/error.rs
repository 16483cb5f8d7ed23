//! The inbound-facing error type: every outcome the Dispatcher or handler
//! can produce collapses into one of these kinds, each carrying enough to
//! render the native error shape of whichever family the client spoke.

use bytes::Bytes;
use http::StatusCode;
use novagate_protocol::ApiFamily;

/// Mirrors spec.md's error taxonomy (section 7), surfaced verbatim in
/// ErrorRecord.kind so an operator can grep the Journal by failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientBadRequest,
    ClientUnauthorized,
    UpstreamRateLimited,
    UpstreamAuth,
    UpstreamServerError,
    UpstreamContentPolicy,
    StreamTruncated,
    ClientCancel,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ClientBadRequest => "client_bad_request",
            ErrorKind::ClientUnauthorized => "client_unauthorized",
            ErrorKind::UpstreamRateLimited => "upstream_rate_limited",
            ErrorKind::UpstreamAuth => "upstream_auth",
            ErrorKind::UpstreamServerError => "upstream_server_error",
            ErrorKind::UpstreamContentPolicy => "upstream_content_policy",
            ErrorKind::StreamTruncated => "stream_truncated",
            ErrorKind::ClientCancel => "client_cancel",
            ErrorKind::Internal => "internal",
        }
    }

    fn default_status(self) -> StatusCode {
        match self {
            ErrorKind::ClientBadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::ClientUnauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::UpstreamAuth => StatusCode::BAD_GATEWAY,
            ErrorKind::UpstreamServerError => StatusCode::BAD_GATEWAY,
            ErrorKind::UpstreamContentPolicy => StatusCode::BAD_REQUEST,
            ErrorKind::StreamTruncated => StatusCode::OK,
            ErrorKind::ClientCancel => StatusCode::OK,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A fully-formed error response: status plus a body already encoded in the
/// inbound family's native error shape. Built by [`ProxyError::into_response_body`]
/// rather than derived generically, since each family's error envelope
/// differs (`{error:{message,type,code}}` for CHAT/RESP, a top-level
/// `{type,error:{type,message}}` for MSG, `{error:{code,message,status}}`
/// for GEM).
#[derive(Debug)]
pub struct ProxyError {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
    pub request_id: String,
}

impl ProxyError {
    pub fn new(kind: ErrorKind, request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: kind.default_status(),
            kind,
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn bad_request(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientBadRequest, request_id, message)
    }

    pub fn unauthorized(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientUnauthorized, request_id, message)
    }

    pub fn alias_not_found(request_id: impl Into<String>, alias: &str) -> Self {
        Self::new(
            ErrorKind::ClientBadRequest,
            request_id,
            format!("unknown alias or passthrough target: {alias}"),
        )
        .with_status(StatusCode::NOT_FOUND)
    }

    pub fn no_enabled_targets(request_id: impl Into<String>, alias: &str) -> Self {
        Self::new(
            ErrorKind::UpstreamServerError,
            request_id,
            format!("no enabled targets for: {alias}"),
        )
        .with_status(StatusCode::SERVICE_UNAVAILABLE)
    }

    pub fn failover_exhausted(request_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamServerError, request_id, summary).with_status(StatusCode::BAD_GATEWAY)
    }

    pub fn internal(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, request_id, message)
    }

    /// Renders this error in the native error envelope of `family`, falling
    /// back to a generic JSON shape for the specialised families (they have
    /// no distinct error envelope of their own per spec.md's family list).
    pub fn to_body(&self, family: ApiFamily) -> Bytes {
        let value = match family {
            ApiFamily::Chat | ApiFamily::Responses | ApiFamily::Embeddings | ApiFamily::Transcriptions
            | ApiFamily::Speech | ApiFamily::Images => serde_json::json!({
                "error": {
                    "message": self.message,
                    "type": self.kind.as_str(),
                    "code": self.status.as_u16(),
                    "request_id": self.request_id,
                }
            }),
            ApiFamily::Messages => serde_json::json!({
                "type": "error",
                "error": {
                    "type": self.kind.as_str(),
                    "message": self.message,
                },
                "request_id": self.request_id,
            }),
            ApiFamily::Gemini => serde_json::json!({
                "error": {
                    "code": self.status.as_u16(),
                    "message": self.message,
                    "status": self.kind.as_str(),
                }
            }),
        };
        Bytes::from(value.to_string())
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ProxyError {}
