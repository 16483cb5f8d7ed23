//! The seam between the Dispatcher and a concrete upstream provider: a
//! provider builds an [`UpstreamHttpRequest`] from an already-transcoded wire
//! body, and classifies failures into cooldown/auth decisions. It never
//! performs IO itself — a higher layer (`novagate-core::dispatch`) does.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;

use novagate_protocol::ApiFamily;

use crate::config::Provider;
use crate::cooldown::UpstreamSignal;
use crate::credential::Credential;
use crate::errors::ProviderResult;
use crate::headers::{Headers, header_get};

pub type ByteStream = tokio::sync::mpsc::Receiver<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

#[derive(Debug)]
pub struct UpstreamHttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: UpstreamBody,
}

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub is_stream: bool,
}

/// Downstream request for provider-managed OAuth start/callback. Not part of
/// protocol transform; a provider internal ability (device-code, PKCE,
/// redirect-capture) it implements on top of the `OAuthSessionManager`.
#[derive(Debug, Clone)]
pub struct OAuthStartRequest {
    pub query: Option<String>,
    pub headers: Headers,
}

#[derive(Debug, Clone)]
pub struct OAuthCallbackRequest {
    pub query: Option<String>,
    pub headers: Headers,
}

#[derive(Debug, Clone)]
pub struct OAuthCredential {
    pub name: Option<String>,
    pub settings_json: Option<serde_json::Value>,
    pub credential: Credential,
}

#[derive(Debug)]
pub struct OAuthCallbackResult {
    pub response: UpstreamHttpResponse,
    pub credential: Option<OAuthCredential>,
}

#[derive(Debug, Clone)]
pub struct UpstreamCtx {
    pub trace_id: Option<String>,
    pub provider_id: String,
    pub upstream_model: String,
    pub family: ApiFamily,
    pub attempt_no: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UpstreamTransportErrorKind {
    Timeout,
    ReadTimeout,
    Connect,
    Dns,
    Tls,
    Other,
}

#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    /// Transport-level failures (no HTTP response reached the client).
    Transport {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
    /// HTTP error response captured as bytes (usually non-2xx).
    Http {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
}

#[derive(Debug)]
pub enum AuthRetryAction {
    None,
    RetrySame,
    UpdateCredential(Box<Credential>),
}

/// Maps an upstream failure to the [`UpstreamSignal`] the Cooldown Manager's
/// entry-rule table expects, or `None` for a non-retryable failure the
/// Dispatcher should surface directly rather than cool down.
pub fn classify_failure(failure: &UpstreamFailure) -> Option<UpstreamSignal> {
    match failure {
        UpstreamFailure::Http { status, headers, body } => match *status {
            404 => None,
            429 => Some(UpstreamSignal::RateLimited {
                retry_after: parse_retry_after(headers),
            }),
            401 | 403 => Some(UpstreamSignal::Unauthorized),
            400 if is_model_unavailable_body(body) => Some(UpstreamSignal::ModelUnavailable),
            s if (500..600).contains(&s) => Some(UpstreamSignal::ServerError),
            _ => None,
        },
        UpstreamFailure::Transport { .. } => Some(UpstreamSignal::ServerError),
    }
}

/// Recognizes the handful of `error.code`/`error.type`/message phrasings
/// OpenAI-, Anthropic-, and Gemini-shaped backends use for "this model
/// isn't servable right now" on an otherwise-400 response (model not found,
/// deprecated, or disabled for the account) — distinct from a malformed
/// request, which should surface to the client rather than cool the model
/// down.
fn is_model_unavailable_body(body: &Bytes) -> bool {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return false;
    };
    let error = value.get("error").unwrap_or(&value);
    let code = error.get("code").and_then(|v| v.as_str()).unwrap_or("");
    let kind = error.get("type").or_else(|| error.get("status")).and_then(|v| v.as_str()).unwrap_or("");
    let message = error.get("message").and_then(|v| v.as_str()).unwrap_or("").to_ascii_lowercase();

    if code.contains("model_not_found") || code.contains("model_unavailable") {
        return true;
    }
    if kind.contains("model_not_found") || kind.contains("not_found_error") {
        return true;
    }
    let mentions_model = message.contains("model");
    let mentions_unavailable =
        message.contains("not found") || message.contains("unavailable") || message.contains("does not exist") || message.contains("deprecated");
    mentions_model && mentions_unavailable
}

/// Parses either form `Retry-After` is allowed to take: delta-seconds, or an
/// HTTP-date giving the instant cooldown should end.
fn parse_retry_after(headers: &Headers) -> Option<Duration> {
    let value = header_get(headers, "retry-after")?.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = httpdate::parse_http_date(value).ok()?;
    when.duration_since(SystemTime::now()).ok()
}

#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds the outbound HTTP request for a request already transcoded
    /// into this provider's destination wire shape (`body`); the provider's
    /// job is URL construction, auth header injection and header/extraBody
    /// overrides, not wire-shape translation (that is `novagate-transform`'s
    /// job, already done by the time this is called).
    async fn build_request(
        &self,
        ctx: &UpstreamCtx,
        provider: &Provider,
        credential: &Credential,
        body: Bytes,
        stream: bool,
    ) -> ProviderResult<UpstreamHttpRequest>;

    /// Provider-managed OAuth start (downstream endpoint). Only OAuth-kind
    /// providers (Codex, ClaudeCode) override this.
    fn oauth_start(
        &self,
        _ctx: &UpstreamCtx,
        _provider: &Provider,
        _req: &OAuthStartRequest,
    ) -> ProviderResult<UpstreamHttpResponse> {
        Err(crate::errors::ProviderError::Unsupported("oauth_start"))
    }

    fn oauth_callback(
        &self,
        _ctx: &UpstreamCtx,
        _provider: &Provider,
        _req: &OAuthCallbackRequest,
    ) -> ProviderResult<OAuthCallbackResult> {
        Err(crate::errors::ProviderError::Unsupported("oauth_callback"))
    }

    /// Optional hook for a provider-specific auth-failure response, e.g.
    /// retrying once with an upgraded credential after an upstream 401.
    async fn on_auth_failure(
        &self,
        _ctx: &UpstreamCtx,
        _provider: &Provider,
        _credential: &Credential,
        _failure: &UpstreamFailure,
    ) -> ProviderResult<AuthRetryAction> {
        Ok(AuthRetryAction::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_429_to_rate_limited() {
        let failure = UpstreamFailure::Http {
            status: 429,
            headers: vec![("retry-after".to_string(), "12".to_string())],
            body: Bytes::new(),
        };
        match classify_failure(&failure) {
            Some(UpstreamSignal::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(12)));
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn classify_treats_404_as_non_retryable() {
        let failure = UpstreamFailure::Http {
            status: 404,
            headers: Vec::new(),
            body: Bytes::new(),
        };
        assert!(classify_failure(&failure).is_none());
    }

    #[test]
    fn parse_retry_after_accepts_an_http_date_in_the_future() {
        let later = SystemTime::now() + Duration::from_secs(120);
        let headers = vec![("retry-after".to_string(), httpdate::fmt_http_date(later))];
        let parsed = parse_retry_after(&headers).unwrap();
        assert!(parsed.as_secs() >= 110 && parsed.as_secs() <= 120);
    }

    #[test]
    fn classify_honors_an_http_date_retry_after_on_429() {
        let later = SystemTime::now() + Duration::from_secs(45);
        let failure = UpstreamFailure::Http {
            status: 429,
            headers: vec![("retry-after".to_string(), httpdate::fmt_http_date(later))],
            body: Bytes::new(),
        };
        match classify_failure(&failure) {
            Some(UpstreamSignal::RateLimited { retry_after: Some(retry_after) }) => {
                assert!(retry_after.as_secs() > 0 && retry_after.as_secs() <= 45);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn parse_retry_after_rejects_garbage() {
        let headers = vec![("retry-after".to_string(), "not-a-date".to_string())];
        assert!(parse_retry_after(&headers).is_none());
    }

    #[test]
    fn classify_maps_a_model_not_found_400_to_model_unavailable() {
        let failure = UpstreamFailure::Http {
            status: 400,
            headers: Vec::new(),
            body: Bytes::from_static(br#"{"error":{"code":"model_not_found","message":"The model does not exist"}}"#),
        };
        assert!(matches!(classify_failure(&failure), Some(UpstreamSignal::ModelUnavailable)));
    }

    #[test]
    fn classify_maps_a_plain_message_mentioning_model_unavailable_too() {
        let failure = UpstreamFailure::Http {
            status: 400,
            headers: Vec::new(),
            body: Bytes::from_static(br#"{"error":{"message":"requested model is unavailable"}}"#),
        };
        assert!(matches!(classify_failure(&failure), Some(UpstreamSignal::ModelUnavailable)));
    }

    #[test]
    fn classify_treats_an_ordinary_400_as_non_retryable() {
        let failure = UpstreamFailure::Http {
            status: 400,
            headers: Vec::new(),
            body: Bytes::from_static(br#"{"error":{"message":"missing required field \"messages\""}}"#),
        };
        assert!(classify_failure(&failure).is_none());
    }

    #[test]
    fn is_model_unavailable_body_ignores_malformed_json() {
        assert!(!is_model_unavailable_body(&Bytes::from_static(b"not json")));
    }
}
