//! ChatGPT/Codex backend, reached through an OAuth PKCE login rather than an
//! API key. Only the `responses` family is native here — everything else a
//! client asks for through this provider is transcoded down to `responses`
//! by `novagate-transform` before `build_request` ever sees it.
//!
//! Grounded on `providers/codex/mod.rs` (request shape: bearer token +
//! `chatgpt-account-id` header, `/responses` path) and `providers/codex/
//! oauth.rs` (the PKCE authorization-code dance). A device-code flow for
//! headless logins is not implemented; this keeps only the browser PKCE
//! path, since the admin surface this gateway exposes is a redirect-capable
//! HTTP callback, not a TTY prompt loop (tracked as an open decision in the
//! crate's design notes rather than silently dropped).

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use rand::RngCore;
use serde::Deserialize;

use novagate_provider_core::{
    AuthRetryAction, CodexCredential, Credential, HttpMethod, OAuthCallbackRequest,
    OAuthCallbackResult, OAuthCredential, OAuthStartRequest, Provider, ProviderError,
    ProviderResult, UpstreamCtx, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamProvider, header_set,
};

use crate::http_client::shared_client;
use crate::oauth_common::{block_on, parse_query_value, resolve_manual_code_and_state};

const PROVIDER_NAME: &str = "codex";
const DEFAULT_BASE_URL: &str = "https://chatgpt.com/backend-api/codex";
const DEFAULT_ISSUER: &str = "https://auth.openai.com";
const CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
const OAUTH_SCOPE: &str = "openid profile email offline_access";
const OAUTH_STATE_TTL_SECS: u64 = 600;
const DEFAULT_REDIRECT_URI: &str = "http://localhost:1455/auth/callback";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
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
pub struct CodexProvider;

impl CodexProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UpstreamProvider for CodexProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn build_request(
        &self,
        _ctx: &UpstreamCtx,
        provider: &Provider,
        credential: &Credential,
        body: Bytes,
        stream: bool,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let base_url = provider
            .api_base_url
            .values()
            .next()
            .map(String::as_str)
            .unwrap_or(DEFAULT_BASE_URL);
        let (access_token, account_id) = codex_credential(credential)?;

        let url = format!("{}/responses", base_url.trim_end_matches('/'));
        let mut headers = Vec::new();
        header_set(&mut headers, "authorization", format!("Bearer {access_token}"));
        header_set(&mut headers, "accept", "application/json");
        header_set(&mut headers, "content-type", "application/json");
        header_set(&mut headers, "chatgpt-account-id", account_id);

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
            tracing::warn!(event = "codex.oauth_callback", error = %detail);
            return Ok(OAuthCallbackResult {
                response: json_error(400, &detail),
                credential: None,
            });
        }

        let (code, state) = match resolve_manual_code_and_state(req.query.as_deref()) {
            Ok(value) => value,
            Err(message) => {
                tracing::warn!(event = "codex.oauth_callback", error = %message);
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
        build_callback_result(tokens)
    }

    async fn on_auth_failure(
        &self,
        _ctx: &UpstreamCtx,
        _provider: &Provider,
        credential: &Credential,
        _failure: &UpstreamFailure,
    ) -> ProviderResult<AuthRetryAction> {
        let Credential::Codex(cred) = credential else {
            return Ok(AuthRetryAction::None);
        };
        let tokens = exchange_refresh_token(&cred.refresh_token).await?;
        let mut updated = cred.clone();
        updated.access_token = tokens.access_token;
        if let Some(refresh_token) = tokens.refresh_token {
            updated.refresh_token = refresh_token;
        }
        if let Some(id_token) = tokens.id_token {
            updated.id_token = id_token;
        }
        Ok(AuthRetryAction::UpdateCredential(Box::new(Credential::Codex(updated))))
    }
}

fn codex_credential(credential: &Credential) -> ProviderResult<(&str, &str)> {
    match credential {
        Credential::Codex(cred) => Ok((cred.access_token.as_str(), cred.account_id.as_str())),
        _ => Err(ProviderError::InvalidConfig(
            "expected a codex oauth credential".to_string(),
        )),
    }
}

fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_code_challenge(code_verifier: &str) -> String {
    use sha2::Digest;
    let digest = sha2::Sha256::digest(code_verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn build_authorize_url(redirect_uri: &str, code_challenge: &str, state: &str) -> String {
    let query = [
        ("response_type", "code"),
        ("client_id", CLIENT_ID),
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
    format!("{}/oauth/authorize?{query}", DEFAULT_ISSUER.trim_end_matches('/'))
}

async fn exchange_code_for_tokens(
    redirect_uri: &str,
    code_verifier: &str,
    code: &str,
) -> ProviderResult<TokenResponse> {
    let body = format!(
        "grant_type=authorization_code&code={}&redirect_uri={}&client_id={}&code_verifier={}",
        urlencoding::encode(code),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(CLIENT_ID),
        urlencoding::encode(code_verifier),
    );
    post_token_request(body).await
}

async fn exchange_refresh_token(refresh_token: &str) -> ProviderResult<TokenResponse> {
    let body = format!(
        "grant_type=refresh_token&refresh_token={}&client_id={}",
        urlencoding::encode(refresh_token),
        urlencoding::encode(CLIENT_ID),
    );
    post_token_request(body).await
}

async fn post_token_request(form_body: String) -> ProviderResult<TokenResponse> {
    let client = shared_client()?;
    let resp = client
        .post(format!("{}/oauth/token", DEFAULT_ISSUER.trim_end_matches('/')))
        .header("content-type", "application/x-www-form-urlencoded")
        .body(form_body)
        .send()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    if !status.is_success() {
        tracing::warn!(event = "codex.oauth_token", status = %status.as_u16());
        return Err(ProviderError::Other(format!(
            "codex oauth token request failed: {status} {}",
            String::from_utf8_lossy(&bytes)
        )));
    }
    serde_json::from_slice(&bytes).map_err(|err| ProviderError::Other(err.to_string()))
}

fn build_callback_result(tokens: TokenResponse) -> ProviderResult<OAuthCallbackResult> {
    let Some(refresh_token) = tokens.refresh_token.clone() else {
        return Ok(OAuthCallbackResult {
            response: json_error(400, "missing_refresh_token"),
            credential: None,
        });
    };
    let Some(id_token) = tokens.id_token.clone() else {
        return Ok(OAuthCallbackResult {
            response: json_error(400, "missing_id_token"),
            credential: None,
        });
    };
    let claims = parse_id_token_claims(&id_token);
    let Some(account_id) = claims.account_id.clone() else {
        return Ok(OAuthCallbackResult {
            response: json_error(400, "missing_account_id"),
            credential: None,
        });
    };

    let credential = OAuthCredential {
        name: claims.email.clone().or_else(|| Some(format!("codex:{account_id}"))),
        settings_json: None,
        credential: Credential::Codex(CodexCredential {
            access_token: tokens.access_token.clone(),
            refresh_token: refresh_token.clone(),
            id_token: id_token.clone(),
            user_email: claims.email.clone(),
            account_id: account_id.clone(),
            expires_at: 0,
        }),
    };

    Ok(OAuthCallbackResult {
        response: json_response(serde_json::json!({
            "account_id": account_id,
            "email": claims.email,
        })),
        credential: Some(credential),
    })
}

#[derive(Debug, Default)]
struct IdTokenClaims {
    email: Option<String>,
    account_id: Option<String>,
}

fn parse_id_token_claims(id_token: &str) -> IdTokenClaims {
    let mut claims = IdTokenClaims::default();
    let mut parts = id_token.split('.');
    let (Some(_h), Some(payload_b64), Some(_s)) = (parts.next(), parts.next(), parts.next()) else {
        return claims;
    };
    let Ok(payload_bytes) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload_b64) else {
        return claims;
    };
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&payload_bytes) else {
        return claims;
    };
    claims.email = payload
        .get("email")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    claims.account_id = payload
        .get("https://api.openai.com/auth")
        .and_then(|auth| auth.get("chatgpt_account_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    claims
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

fn current_unix_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_account_id_and_email_from_id_token() {
        let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{}");
        let payload = serde_json::json!({
            "email": "dev@example.com",
            "https://api.openai.com/auth": { "chatgpt_account_id": "acct_123" },
        });
        let payload_b64 =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let id_token = format!("{header}.{payload_b64}.sig");
        let claims = parse_id_token_claims(&id_token);
        assert_eq!(claims.email.as_deref(), Some("dev@example.com"));
        assert_eq!(claims.account_id.as_deref(), Some("acct_123"));
    }

    #[test]
    fn malformed_id_token_yields_empty_claims() {
        let claims = parse_id_token_claims("not-a-jwt");
        assert!(claims.email.is_none());
        assert!(claims.account_id.is_none());
    }

    #[test]
    fn authorize_url_carries_pkce_and_state() {
        let url = build_authorize_url("http://localhost:1455/auth/callback", "chal", "st1");
        assert!(url.contains("code_challenge=chal"));
        assert!(url.contains("state=st1"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn callback_result_requires_refresh_and_id_token() {
        let tokens = TokenResponse {
            access_token: "tok".to_string(),
            refresh_token: None,
            id_token: None,
        };
        let result = build_callback_result(tokens).unwrap();
        assert_eq!(result.response.status, 400);
        assert!(result.credential.is_none());
    }

    #[test]
    fn timestamp_helper_is_nonzero() {
        assert!(current_unix_ts() > 0);
    }
}
