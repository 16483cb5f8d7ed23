//! Anthropic's Claude Code subscription backend, reached with the same
//! OAuth PKCE bearer token the CLI itself uses, rather than a console API
//! key. Only the `messages` family is native; everything else is
//! transcoded down to Anthropic's wire shape by `novagate-transform` before
//! `build_request` runs.
//!
//! Grounded on `providers/claudecode/mod.rs` (bearer + `anthropic-beta:
//! oauth-2025-04-20` header, system-prompt prelude injection keyed off
//! user-agent) and `providers/claudecode/oauth.rs` (PKCE authorization-code
//! flow against `claude.ai`). Long-context-beta probing and cookie-session
//! fallback are both account-tier-specific behavior this gateway doesn't
//! track per credential; dropped rather than faked, per the crate's design
//! notes.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use rand::RngCore;
use serde::Deserialize;

use novagate_provider_core::{
    AuthRetryAction, ClaudeCodeCredential, Credential, HttpMethod, OAuthCallbackRequest,
    OAuthCallbackResult, OAuthCredential, OAuthStartRequest, Provider, ProviderError,
    ProviderResult, UpstreamCtx, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamProvider, header_get, header_set,
};

use crate::http_client::shared_client;
use crate::oauth_common::{block_on, parse_query_value, resolve_manual_code_and_state};

const PROVIDER_NAME: &str = "claudecode";
const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_OAUTH_ISSUER: &str = "https://claude.ai";
const DEFAULT_REDIRECT_URI: &str = "https://platform.claude.com/oauth/code/callback";
const CLAUDE_CODE_UA: &str = "claude-code/2.1.27";
const SYSTEM_PRELUDE: &str = "You are Claude Code, Anthropic's official CLI for Claude.";
const CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
const OAUTH_SCOPE: &str = "user:profile user:inference user:sessions:claude_code";
const OAUTH_STATE_TTL_SECS: u64 = 600;
const HEADER_BETA: &str = "anthropic-beta";
const OAUTH_BETA: &str = "oauth-2025-04-20";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct PendingAuth {
    code_verifier: String,
    redirect_uri: String,
    created_at: Instant,
}

static PENDING: OnceLock<Mutex<HashMap<String, PendingAuth>>> = OnceLock::new();

fn pending_states() -> &'static Mutex<HashMap<String, PendingAuth>> {
    PENDING.get_or_init(|| Mutex::new(HashMap::new()))
}

fn prune_pending(states: &mut HashMap<String, PendingAuth>) {
    let now = Instant::now();
    states.retain(|_, entry| now.duration_since(entry.created_at) <= Duration::from_secs(OAUTH_STATE_TTL_SECS));
}

#[derive(Debug, Default)]
pub struct ClaudeCodeProvider;

impl ClaudeCodeProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UpstreamProvider for ClaudeCodeProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn build_request(
        &self,
        ctx: &UpstreamCtx,
        provider: &Provider,
        credential: &Credential,
        body: Bytes,
        stream: bool,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let access_token = claudecode_access_token(credential)?;
        let base_url = provider
            .api_base_url
            .values()
            .next()
            .map(String::as_str)
            .unwrap_or(DEFAULT_API_BASE_URL);
        let url = format!("{}/v1/messages", base_url.trim_end_matches('/'));

        let mut body_value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|err| ProviderError::Other(format!("request body is not valid json: {err}")))?;
        if let Some(obj) = body_value.as_object_mut() {
            inject_system_prelude(obj, ctx_user_agent(ctx));
        }
        let body = serde_json::to_vec(&body_value)
            .map(Bytes::from)
            .map_err(|err| ProviderError::Other(err.to_string()))?;

        let mut headers = Vec::new();
        header_set(&mut headers, "authorization", format!("Bearer {access_token}"));
        header_set(&mut headers, "accept", "application/json");
        header_set(&mut headers, "content-type", "application/json");
        header_set(&mut headers, "user-agent", CLAUDE_CODE_UA);
        header_set(&mut headers, "anthropic-version", "2023-06-01");
        for (name, value) in &provider.headers {
            header_set(&mut headers, name, crate::env::resolve(value));
        }
        ensure_oauth_beta(&mut headers);

        Ok(UpstreamHttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(body),
            is_stream: stream,
        })
    }

    fn oauth_start(
        &self,
        _ctx: &UpstreamCtx,
        _provider: &Provider,
        req: &OAuthStartRequest,
    ) -> ProviderResult<UpstreamHttpResponse> {
        let redirect_uri = parse_query_value(req.query.as_deref(), "redirect_uri")
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state();

        let mut guard = pending_states()
            .lock()
            .map_err(|_| ProviderError::Other("oauth state lock poisoned".to_string()))?;
        prune_pending(&mut guard);
        guard.insert(
            state.clone(),
            PendingAuth {
                code_verifier,
                redirect_uri: redirect_uri.clone(),
                created_at: Instant::now(),
            },
        );

        let auth_url = build_authorize_url(&redirect_uri, &code_challenge, &state);
        Ok(json_response(serde_json::json!({
            "auth_url": auth_url,
            "state": state,
            "redirect_uri": redirect_uri,
            "instructions": "Open auth_url, then call the callback endpoint with code/state (or callback_url).",
        })))
    }

    fn oauth_callback(
        &self,
        _ctx: &UpstreamCtx,
        _provider: &Provider,
        req: &OAuthCallbackRequest,
    ) -> ProviderResult<OAuthCallbackResult> {
        if let Some(error) = parse_query_value(req.query.as_deref(), "error") {
            let detail =
                parse_query_value(req.query.as_deref(), "error_description").unwrap_or(error);
            tracing::warn!(event = "claudecode.oauth_callback", error = %detail);
            return Ok(OAuthCallbackResult {
                response: json_error(400, &detail),
                credential: None,
            });
        }

        let (code, state) = match resolve_manual_code_and_state(req.query.as_deref()) {
            Ok(value) => value,
            Err(message) => {
                tracing::warn!(event = "claudecode.oauth_callback", error = %message);
                return Ok(OAuthCallbackResult {
                    response: json_error(400, message),
                    credential: None,
                });
            }
        };

        let pending = {
            let mut guard = pending_states()
                .lock()
                .map_err(|_| ProviderError::Other("oauth state lock poisoned".to_string()))?;
            prune_pending(&mut guard);
            match state {
                Some(state) => guard.remove(&state),
                None if guard.len() == 1 => {
                    let key = guard.keys().next().cloned();
                    key.and_then(|k| guard.remove(&k))
                }
                None => None,
            }
        };
        let Some(pending) = pending else {
            return Ok(OAuthCallbackResult {
                response: json_error(400, "missing or expired oauth state"),
                credential: None,
            });
        };

        let tokens = block_on(exchange_code_for_tokens(
            &pending.redirect_uri,
            &pending.code_verifier,
            &code,
        ))?;
        Ok(build_callback_result(tokens))
    }

    async fn on_auth_failure(
        &self,
        _ctx: &UpstreamCtx,
        _provider: &Provider,
        credential: &Credential,
        _failure: &UpstreamFailure,
    ) -> ProviderResult<AuthRetryAction> {
        let Credential::ClaudeCode(cred) = credential else {
            return Ok(AuthRetryAction::None);
        };
        if cred.refresh_token.is_empty() {
            return Ok(AuthRetryAction::None);
        }
        let tokens = exchange_refresh_token(&cred.refresh_token).await?;
        let mut updated = cred.clone();
        updated.access_token = tokens.access_token;
        if let Some(refresh_token) = tokens.refresh_token {
            updated.refresh_token = refresh_token;
        }
        if let Some(expires_in) = tokens.expires_in {
            updated.expires_at = now_unix() + expires_in;
        }
        Ok(AuthRetryAction::UpdateCredential(Box::new(
            Credential::ClaudeCode(updated),
        )))
    }
}

fn ctx_user_agent(_ctx: &UpstreamCtx) -> Option<&str> {
    // `UpstreamCtx` does not carry the downstream user-agent; the prelude is
    // always injected, matching the non-claude-code-client branch.
    None
}

fn claudecode_access_token(credential: &Credential) -> ProviderResult<String> {
    match credential {
        Credential::ClaudeCode(secret) if !secret.access_token.is_empty() => {
            Ok(secret.access_token.clone())
        }
        Credential::ClaudeCode(_) => Err(ProviderError::MissingCredentialField("access_token")),
        _ => Err(ProviderError::InvalidConfig(
            "expected a claude code oauth credential".to_string(),
        )),
    }
}

fn inject_system_prelude(body: &mut serde_json::Map<String, serde_json::Value>, user_agent: Option<&str>) {
    if user_agent.map(is_claude_code_user_agent).unwrap_or(false) {
        return;
    }
    let prelude_block = serde_json::json!({ "type": "text", "text": SYSTEM_PRELUDE });
    match body.get_mut("system") {
        Some(serde_json::Value::String(text)) => {
            if text.contains(SYSTEM_PRELUDE) {
                return;
            }
            let existing = serde_json::json!({ "type": "text", "text": text.clone() });
            body.insert(
                "system".to_string(),
                serde_json::Value::Array(vec![prelude_block, existing]),
            );
        }
        Some(serde_json::Value::Array(blocks)) => {
            let already_present = blocks.iter().any(|b| {
                b.get("text")
                    .and_then(|t| t.as_str())
                    .map(|t| t.contains(SYSTEM_PRELUDE))
                    .unwrap_or(false)
            });
            if !already_present {
                blocks.insert(0, prelude_block);
            }
        }
        _ => {
            body.insert(
                "system".to_string(),
                serde_json::Value::Array(vec![prelude_block]),
            );
        }
    }
}

fn is_claude_code_user_agent(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    lowered.contains("claude-code") || lowered.contains("claude-cli")
}

fn ensure_oauth_beta(headers: &mut novagate_provider_core::Headers) {
    let mut values: Vec<String> = header_get(headers, HEADER_BETA)
        .map(|value| {
            value
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if !values.iter().any(|v| v.eq_ignore_ascii_case(OAUTH_BETA)) {
        values.push(OAUTH_BETA.to_string());
    }
    header_set(headers, HEADER_BETA, values.join(","));
}

fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_code_challenge(code_verifier: &str) -> String {
    use sha2::Digest;
    let digest = sha2::Sha256::digest(code_verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn build_authorize_url(redirect_uri: &str, code_challenge: &str, state: &str) -> String {
    let query = [
        ("code", "true"),
        ("client_id", CLIENT_ID),
        ("response_type", "code"),
        ("redirect_uri", redirect_uri),
        ("scope", OAUTH_SCOPE),
        ("code_challenge", code_challenge),
        ("code_challenge_method", "S256"),
        ("state", state),
    ]
    .into_iter()
    .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
    .collect::<Vec<_>>()
    .join("&");
    format!("{}/oauth/authorize?{query}", DEFAULT_OAUTH_ISSUER.trim_end_matches('/'))
}

async fn exchange_code_for_tokens(
    redirect_uri: &str,
    code_verifier: &str,
    code: &str,
) -> ProviderResult<TokenResponse> {
    let payload = serde_json::json!({
        "grant_type": "authorization_code",
        "code": code,
        "redirect_uri": redirect_uri,
        "client_id": CLIENT_ID,
        "code_verifier": code_verifier,
    });
    post_token_request(payload).await
}

async fn exchange_refresh_token(refresh_token: &str) -> ProviderResult<TokenResponse> {
    let payload = serde_json::json!({
        "grant_type": "refresh_token",
        "refresh_token": refresh_token,
        "client_id": CLIENT_ID,
    });
    post_token_request(payload).await
}

async fn post_token_request(payload: serde_json::Value) -> ProviderResult<TokenResponse> {
    let client = shared_client()?;
    let resp = client
        .post(format!("{}/v1/oauth/token", DEFAULT_OAUTH_ISSUER.trim_end_matches('/')))
        .header("content-type", "application/json")
        .json(&payload)
        .send()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    if !status.is_success() {
        tracing::warn!(event = "claudecode.oauth_token", status = %status.as_u16());
        return Err(ProviderError::Other(format!(
            "claude code oauth token request failed: {status} {}",
            String::from_utf8_lossy(&bytes)
        )));
    }
    serde_json::from_slice(&bytes).map_err(|err| ProviderError::Other(err.to_string()))
}

fn build_callback_result(tokens: TokenResponse) -> OAuthCallbackResult {
    let refresh_token = tokens.refresh_token.clone().unwrap_or_default();
    let expires_at = tokens
        .expires_in
        .map(|secs| now_unix() + secs)
        .unwrap_or(0);
    let credential = OAuthCredential {
        name: None,
        settings_json: None,
        credential: Credential::ClaudeCode(ClaudeCodeCredential {
            access_token: tokens.access_token.clone(),
            refresh_token,
            expires_at,
            session_key: None,
            user_email: None,
        }),
    };
    OAuthCallbackResult {
        response: json_response(serde_json::json!({ "status": "ok" })),
        credential: Some(credential),
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn json_response(body: serde_json::Value) -> UpstreamHttpResponse {
    let mut headers = Vec::new();
    header_set(&mut headers, "content-type", "application/json");
    UpstreamHttpResponse {
        status: 200,
        headers,
        body: novagate_provider_core::UpstreamBody::Bytes(Bytes::from(
            serde_json::to_vec(&body).unwrap_or_default(),
        )),
    }
}

fn json_error(status: u16, message: &str) -> UpstreamHttpResponse {
    let mut headers = Vec::new();
    header_set(&mut headers, "content-type", "application/json");
    UpstreamHttpResponse {
        status,
        headers,
        body: novagate_provider_core::UpstreamBody::Bytes(Bytes::from(
            serde_json::to_vec(&serde_json::json!({ "error": message })).unwrap_or_default(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_prelude_into_string_system() {
        let mut body = serde_json::json!({ "system": "custom instructions" })
            .as_object()
            .unwrap()
            .clone();
        inject_system_prelude(&mut body, None);
        let system = body.get("system").unwrap().as_array().unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(system[0]["text"], SYSTEM_PRELUDE);
    }

    #[test]
    fn skips_prelude_for_claude_code_user_agent() {
        let mut body = serde_json::json!({}).as_object().unwrap().clone();
        inject_system_prelude(&mut body, Some("claude-code/2.1.27"));
        assert!(body.get("system").is_none());
    }

    #[test]
    fn does_not_duplicate_existing_prelude_block() {
        let mut body = serde_json::json!({
            "system": [{ "type": "text", "text": SYSTEM_PRELUDE }]
        })
        .as_object()
        .unwrap()
        .clone();
        inject_system_prelude(&mut body, None);
        let system = body.get("system").unwrap().as_array().unwrap();
        assert_eq!(system.len(), 1);
    }

    #[test]
    fn ensure_oauth_beta_adds_header_once() {
        let mut headers: novagate_provider_core::Headers = Vec::new();
        ensure_oauth_beta(&mut headers);
        ensure_oauth_beta(&mut headers);
        let value = header_get(&headers, HEADER_BETA).unwrap();
        assert_eq!(value, OAUTH_BETA);
    }

    #[test]
    fn callback_result_requires_nothing_beyond_access_token() {
        let result = build_callback_result(TokenResponse {
            access_token: "tok".to_string(),
            refresh_token: Some("rtok".to_string()),
            expires_in: Some(3600),
        });
        let Some(cred) = result.credential else {
            panic!("expected credential");
        };
        match cred.credential {
            Credential::ClaudeCode(secret) => {
                assert_eq!(secret.access_token, "tok");
                assert_eq!(secret.refresh_token, "rtok");
                assert!(secret.expires_at > 0);
            }
            _ => panic!("expected claude code credential"),
        }
    }
}
