//! Core provider abstractions for novagate.
//!
//! This crate intentionally does **not** depend on axum or any concrete HTTP client.
//! Provider implementations construct `UpstreamHttpRequest` values; a higher layer
//! performs IO and feeds responses back through `ProxyResponse`.

pub mod config;
pub mod cooldown;
pub mod credential;
pub mod errors;
pub mod events;
pub mod headers;
pub mod provider;
pub mod quota;
pub mod registry;
pub mod response;

pub use config::{
    AliasTarget, ModelAlias, ModelEntry, ModelKind, OAUTH_URL_SENTINEL, OAuthProviderKind,
    Priority, Pricing, PricingRange, Provider, ProviderAuth, Selector, UsageBy,
};
pub use cooldown::{CooldownEntry, CooldownKey, CooldownManager, UpstreamSignal};
pub use credential::{
    AcquireError, ApiKeyCredential, ClaudeCodeCredential, CodexCredential, Credential,
    CredentialBundle, CredentialId, CredentialPool, CredentialState, OAuthSession,
    OAuthSessionManager, OAuthSessionStatus, OAuthStartError, SessionError, UnavailableReason,
};
pub use errors::{ProviderError, ProviderResult};
pub use events::{
    DownstreamEvent, Event, EventHub, EventSink, ModelUnavailableEndEvent,
    ModelUnavailableStartEvent, OperationalEvent, TerminalEventSink, UnavailableEndEvent,
    UnavailableStartEvent, UpstreamEvent, UsageSummary,
};
pub use headers::{Headers, header_get, header_remove, header_set};
pub use provider::{
    AuthRetryAction, ByteStream, HttpMethod, OAuthCallbackRequest, OAuthCallbackResult,
    OAuthCredential, OAuthStartRequest, UpstreamBody, UpstreamCtx, UpstreamFailure,
    UpstreamHttpRequest, UpstreamHttpResponse, UpstreamProvider, UpstreamTransportErrorKind,
    classify_failure,
};
pub use quota::{QuotaMirror, QuotaSnapshot};
pub use registry::ProviderRegistry;
pub use response::{ProxyResponse, StreamBody, UpstreamPassthroughError};
