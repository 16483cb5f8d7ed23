//! The Dispatcher: the hot path. Walks the Router's failover chain,
//! transcodes the request/response through `novagate-transform`, and
//! records accounting (Journal, Cooldown Manager, Performance Mirror) as a
//! side effect of every attempt.
//!
//! Grounded on `gproxy-core/src/proxy_engine/dispatch.rs`'s retry-loop
//! shape and `handler.rs`'s attempt/response-building split, generalized:
//! every family pair already collapsed to one canonical IR, so a single
//! `try_target` handles every family combination rather than dispatching
//! through a per-provider typed call-shape table.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use novagate_protocol::ApiFamily;
use novagate_provider_core::{
    AcquireError, ApiKeyCredential, Credential, ProviderAuth, ProviderError, ProxyResponse, StreamBody,
    UpstreamBody, UpstreamCtx, UpstreamFailure, UpstreamSignal, classify_failure,
};
use novagate_router::ResolveError;
use novagate_storage::{DebugTrace, ErrorRecord, UsageRecord};
use tokio::sync::mpsc;

use crate::classify::ClassifiedRequest;
use crate::error::{ErrorKind, ProxyError};
use crate::state::AppState;

pub struct Dispatcher {
    state: Arc<AppState>,
}

/// Per-attempt outcome: either the response the client should receive, a
/// retryable failure (try the next target), or a terminal one (stop and
/// surface it — the upstream already told us the real reason).
enum AttemptOutcome {
    Success(ProxyResponse),
    Retryable(String),
    Terminal(ProxyError),
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn dispatch(
        &self,
        request_id: &str,
        trace_id: &str,
        client_key_name: &str,
        classified: ClassifiedRequest,
    ) -> Result<ProxyResponse, ProxyError> {
        let outcome = {
            let router = self.state.router();
            router
                .resolve(
                    &classified.requested_model,
                    classified.family,
                    &self.state.cooldown,
                    &self.state.performance,
                    self.state.clock.as_ref(),
                )
                .await
                .map_err(|err| match err {
                    ResolveError::AliasNotFound(alias) => ProxyError::alias_not_found(request_id, &alias),
                    ResolveError::NoEnabledTargets(alias) => ProxyError::no_enabled_targets(request_id, &alias),
                })?
        };

        let max_attempts = outcome.ordered_targets.len().min(self.state.max_attempts());
        let mut failures = Vec::with_capacity(max_attempts);

        for (attempt_no, target) in outcome.ordered_targets.iter().take(max_attempts).enumerate() {
            let provider = {
                let router = self.state.router();
                match router.provider(&target.provider_id) {
                    Some(p) => p.clone(),
                    None => continue,
                }
            };

            match self
                .try_target(
                    request_id,
                    trace_id,
                    client_key_name,
                    &classified,
                    &outcome.alias_used,
                    &provider,
                    &target.upstream_model,
                    attempt_no as u32,
                )
                .await
            {
                AttemptOutcome::Success(response) => {
                    self.state.cooldown.record_success(&provider.id, &target.upstream_model).await;
                    return Ok(response);
                }
                AttemptOutcome::Terminal(err) => return Err(err),
                AttemptOutcome::Retryable(summary) => failures.push(summary),
            }
        }

        Err(ProxyError::failover_exhausted(request_id, failures.join("; ")))
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_target(
        &self,
        request_id: &str,
        trace_id: &str,
        client_key_name: &str,
        classified: &ClassifiedRequest,
        alias_used: &str,
        provider: &novagate_provider_core::Provider,
        upstream_model: &str,
        attempt_no: u32,
    ) -> AttemptOutcome {
        let Some(model_entry) = provider.models.get(upstream_model) else {
            return AttemptOutcome::Retryable(format!("{}: model not configured", provider.id));
        };
        let target_family = resolve_target_family(provider, model_entry, classified.family);

        let credential = match self.acquire_credential(provider, upstream_model).await {
            Ok(cred) => cred,
            Err(summary) => return AttemptOutcome::Retryable(summary),
        };

        let impl_name = provider_impl_name(&provider.auth);
        let Some(upstream_provider) = self.state.registry.get(impl_name) else {
            return AttemptOutcome::Terminal(ProxyError::internal(
                request_id,
                format!("no upstream provider implementation registered for {impl_name}"),
            ));
        };

        let mut body = classified.body.clone();
        if target_family != classified.family {
            body = match novagate_transform::transcode_request(classified.family, target_family, &body) {
                Ok(body) => body,
                Err(err) => {
                    return AttemptOutcome::Terminal(ProxyError::bad_request(
                        request_id,
                        format!("request cannot be translated to upstream family: {err}"),
                    ));
                }
            };
        }
        if let Some(obj) = body.as_object_mut() {
            obj.insert("model".to_string(), serde_json::Value::String(upstream_model.to_string()));
        }
        let request_bytes = match serde_json::to_vec(&body) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                return AttemptOutcome::Terminal(ProxyError::internal(request_id, format!("failed to encode upstream body: {err}")));
            }
        };

        let ctx = UpstreamCtx {
            trace_id: Some(trace_id.to_string()),
            provider_id: provider.id.clone(),
            upstream_model: upstream_model.to_string(),
            family: target_family,
            attempt_no,
        };

        let upstream_request = match upstream_provider
            .build_request(&ctx, provider, &credential, request_bytes, classified.stream)
            .await
        {
            Ok(req) => req,
            Err(err) => {
                return AttemptOutcome::Terminal(ProxyError::internal(request_id, format!("failed to build upstream request: {err}")));
            }
        };

        let attempt_started = Instant::now();
        let response = match self.state.http.send(upstream_request).await {
            Ok(response) => response,
            Err(failure) => {
                return self
                    .handle_failure(request_id, provider, upstream_model, classified.family, &failure)
                    .await;
            }
        };

        if !(200..300).contains(&response.status) {
            let failure = match response.body {
                UpstreamBody::Bytes(body) => UpstreamFailure::Http {
                    status: response.status,
                    headers: response.headers,
                    body,
                },
                UpstreamBody::Stream(_) => UpstreamFailure::Http {
                    status: response.status,
                    headers: response.headers,
                    body: Bytes::new(),
                },
            };
            return self
                .handle_failure(request_id, provider, upstream_model, classified.family, &failure)
                .await;
        }

        if classified.stream && target_family.is_generate_content() {
            self.stream_response(
                request_id,
                client_key_name,
                classified,
                alias_used,
                provider,
                upstream_model,
                target_family,
                response,
                attempt_started,
            )
        } else {
            self.buffer_response(
                request_id,
                client_key_name,
                classified,
                alias_used,
                provider,
                upstream_model,
                target_family,
                response,
                attempt_started,
            )
            .await
        }
    }

    async fn acquire_credential(
        &self,
        provider: &novagate_provider_core::Provider,
        upstream_model: &str,
    ) -> Result<Credential, String> {
        match &provider.auth {
            ProviderAuth::ApiKey { key } => Ok(Credential::ApiKey(ApiKeyCredential { api_key: key.clone() })),
            ProviderAuth::OAuth { .. } => self
                .state
                .credentials
                .acquire_for_model(&provider.id, upstream_model)
                .await
                .map(|(_, cred)| cred)
                .map_err(|err| match err {
                    AcquireError::ProviderUnknown => format!("{}: no credential configured", provider.id),
                    AcquireError::NoActiveCredentials => format!("{}: no active credential available", provider.id),
                }),
        }
    }

    async fn handle_failure(
        &self,
        request_id: &str,
        provider: &novagate_provider_core::Provider,
        upstream_model: &str,
        client_family: ApiFamily,
        failure: &UpstreamFailure,
    ) -> AttemptOutcome {
        let status = match failure {
            UpstreamFailure::Http { status, .. } => Some(*status),
            UpstreamFailure::Transport { .. } => None,
        };

        if let Some(signal) = classify_failure(failure) {
            self.state
                .cooldown
                .record_failure(&provider.id, Some(upstream_model), signal.clone())
                .await;
            let kind = match signal {
                UpstreamSignal::RateLimited { .. } => "upstream_rate_limited",
                UpstreamSignal::Unauthorized => "upstream_auth",
                UpstreamSignal::ServerError => "upstream_server_error",
                UpstreamSignal::ModelUnavailable => "upstream_content_policy",
            };
            self.record_error(request_id, provider, upstream_model, kind, failure).await;
            if matches!(signal, UpstreamSignal::Unauthorized) {
                let err = ProxyError::new(ErrorKind::UpstreamAuth, request_id, "upstream authentication failed")
                    .with_status(http::StatusCode::BAD_GATEWAY);
                return AttemptOutcome::Terminal(err);
            }
            return AttemptOutcome::Retryable(format!("{}: {:?}", provider.id, status));
        }

        let kind = match status {
            Some(401) | Some(403) => ErrorKind::UpstreamAuth,
            Some(s) if (400..500).contains(&s) => ErrorKind::UpstreamContentPolicy,
            _ => ErrorKind::Internal,
        };
        self.record_error(request_id, provider, upstream_model, kind.as_str(), failure).await;
        let message = match failure {
            UpstreamFailure::Http { body, .. } => String::from_utf8_lossy(body).to_string(),
            UpstreamFailure::Transport { message, .. } => message.clone(),
        };
        let err = ProxyError::new(kind, request_id, message).with_status(
            status.and_then(|s| http::StatusCode::from_u16(s).ok()).unwrap_or(http::StatusCode::BAD_GATEWAY),
        );
        let _ = client_family;
        AttemptOutcome::Terminal(err)
    }

    async fn record_error(
        &self,
        request_id: &str,
        provider: &novagate_provider_core::Provider,
        upstream_model: &str,
        kind: &str,
        failure: &UpstreamFailure,
    ) {
        let (status_code, message) = match failure {
            UpstreamFailure::Http { status, body, .. } => (Some(*status as i32), String::from_utf8_lossy(body).to_string()),
            UpstreamFailure::Transport { message, .. } => (None, message.clone()),
        };
        self.state.journal.record_error(ErrorRecord {
            request_id: request_id.to_string(),
            ts: self.state.clock.now_utc(),
            kind: kind.to_string(),
            provider_id: Some(provider.id.clone()),
            upstream_model: Some(upstream_model.to_string()),
            status_code,
            message,
            stack: None,
            headers: None,
            provider_response: None,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn stream_response(
        &self,
        request_id: &str,
        client_key_name: &str,
        classified: &ClassifiedRequest,
        alias_used: &str,
        provider: &novagate_provider_core::Provider,
        upstream_model: &str,
        target_family: ApiFamily,
        response: novagate_provider_core::UpstreamHttpResponse,
        attempt_started: Instant,
    ) -> AttemptOutcome {
        let UpstreamBody::Stream(mut upstream_rx) = response.body else {
            return AttemptOutcome::Terminal(ProxyError::internal(request_id, "expected a streamed upstream body"));
        };

        let (tx, rx) = mpsc::channel::<Bytes>(16);
        let state = self.state.clone();
        let request_id = request_id.to_string();
        let client_key_name = client_key_name.to_string();
        let client_family = classified.family;
        let requested_model = classified.requested_model.clone();
        let alias_used = alias_used.to_string();
        let provider_id = provider.id.clone();
        let upstream_model = upstream_model.to_string();
        let discount = provider.discount.unwrap_or(0.0);
        let pricing = provider.models.get(&upstream_model).map(|m| m.pricing.clone());

        tokio::spawn(async move {
            let mut transformer = novagate_protocol_transformer(client_family, target_family, &upstream_model);
            let mut first_byte: Option<Instant> = None;
            let mut total_bytes_out: u64 = 0;
            let mut truncated_by_disconnect = false;

            while let Some(chunk) = upstream_rx.recv().await {
                if first_byte.is_none() {
                    first_byte = Some(Instant::now());
                    state.performance.record_ttft(&provider_id, &upstream_model, attempt_started.elapsed());
                }
                let framed = match transformer.feed(&chunk) {
                    Ok(bytes) => bytes,
                    Err(_) => break,
                };
                total_bytes_out += framed.len() as u64;
                if tx.send(Bytes::from(framed)).await.is_err() {
                    truncated_by_disconnect = true;
                    break;
                }
            }
            if !truncated_by_disconnect {
                if let Ok(trailer) = transformer.close() {
                    total_bytes_out += trailer.len() as u64;
                    let _ = tx.send(Bytes::from(trailer)).await;
                }
            }

            let elapsed = attempt_started.elapsed();
            let snapshot = transformer.snapshot();
            let usage = snapshot.usage.clone();
            let completion_tokens = usage.as_ref().and_then(|u| u.completion_tokens);
            let prompt_tokens = usage.as_ref().and_then(|u| u.prompt_tokens);
            let cost_usd = match (&pricing, prompt_tokens, completion_tokens) {
                (Some(pricing), Some(p), Some(c)) => Some(pricing.estimate_cost(p, c) * (1.0 - discount)),
                _ => None,
            };
            if let Some(completion) = completion_tokens {
                let tokens_per_sec = completion as f64 / elapsed.as_secs_f64().max(0.001);
                state.performance.record_throughput(&provider_id, &upstream_model, tokens_per_sec);
            }
            state.performance.record_request(
                &provider_id,
                &upstream_model,
                prompt_tokens.unwrap_or(0) + completion_tokens.unwrap_or(0),
                Instant::now(),
            );

            let ok = !truncated_by_disconnect && !snapshot.truncated;
            state.journal.record_usage(UsageRecord {
                request_id: request_id.clone(),
                ts: state.clock.now_utc(),
                client_key_name: client_key_name.clone(),
                alias_requested: requested_model.clone(),
                alias_used: alias_used.clone(),
                provider_id: provider_id.clone(),
                upstream_model: upstream_model.clone(),
                api_family_in: client_family.as_str(),
                api_family_out: target_family.as_str(),
                prompt_tokens,
                completion_tokens,
                cached_tokens: usage.as_ref().and_then(|u| u.cached_tokens),
                cache_write_tokens: usage.as_ref().and_then(|u| u.cache_write_tokens),
                cost_usd,
                ttft_ms: first_byte.map(|t| t.duration_since(attempt_started).as_millis() as u64),
                total_ms: elapsed.as_millis() as u64,
                tokens_per_sec: completion_tokens.map(|c| c as f64 / elapsed.as_secs_f64().max(0.001)),
                streamed: true,
                ok,
            });
            if truncated_by_disconnect || snapshot.truncated {
                state.journal.record_debug(DebugTrace {
                    request_id,
                    ts: state.clock.now_utc(),
                    raw_request: serde_json::Value::Null,
                    transformed_request: None,
                    raw_response: None,
                    transformed_response: None,
                    snapshots: vec![serde_json::json!({ "truncated": true, "bytesOut": total_bytes_out })],
                });
            }
        });

        AttemptOutcome::Success(ProxyResponse::Stream {
            status: response.status,
            headers: response.headers,
            body: StreamBody::new(content_type_for(target_family), rx),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn buffer_response(
        &self,
        request_id: &str,
        client_key_name: &str,
        classified: &ClassifiedRequest,
        alias_used: &str,
        provider: &novagate_provider_core::Provider,
        upstream_model: &str,
        target_family: ApiFamily,
        response: novagate_provider_core::UpstreamHttpResponse,
        attempt_started: Instant,
    ) -> AttemptOutcome {
        let UpstreamBody::Bytes(body) = response.body else {
            return AttemptOutcome::Terminal(ProxyError::internal(request_id, "expected a buffered upstream body"));
        };

        let out_body = if target_family == classified.family || !target_family.is_generate_content() {
            body.clone()
        } else {
            let parsed: serde_json::Value = match serde_json::from_slice(&body) {
                Ok(v) => v,
                Err(err) => {
                    return AttemptOutcome::Terminal(ProxyError::internal(request_id, format!("upstream body not json: {err}")));
                }
            };
            match novagate_transform::transcode_response(target_family, classified.family, &parsed) {
                Ok(v) => Bytes::from(v.to_string()),
                Err(err) => {
                    return AttemptOutcome::Terminal(ProxyError::internal(request_id, format!("response translation failed: {err}")));
                }
            }
        };

        let elapsed = attempt_started.elapsed();
        let (prompt_tokens, completion_tokens, cached_tokens, cache_write_tokens) =
            extract_usage(target_family, &body);
        let pricing = provider.models.get(upstream_model).map(|m| m.pricing.clone());
        let discount = provider.discount.unwrap_or(0.0);
        let cost_usd = match (&pricing, prompt_tokens, completion_tokens) {
            (Some(pricing), Some(p), Some(c)) => Some(pricing.estimate_cost(p, c) * (1.0 - discount)),
            _ => None,
        };

        self.state.performance.record_request(
            &provider.id,
            upstream_model,
            prompt_tokens.unwrap_or(0) + completion_tokens.unwrap_or(0),
            Instant::now(),
        );
        if let Some(c) = completion_tokens {
            let tokens_per_sec = c as f64 / elapsed.as_secs_f64().max(0.001);
            self.state.performance.record_throughput(&provider.id, upstream_model, tokens_per_sec);
        }

        self.state.journal.record_usage(UsageRecord {
            request_id: request_id.to_string(),
            ts: self.state.clock.now_utc(),
            client_key_name: client_key_name.to_string(),
            alias_requested: classified.requested_model.clone(),
            alias_used: alias_used.to_string(),
            provider_id: provider.id.clone(),
            upstream_model: upstream_model.to_string(),
            api_family_in: classified.family.as_str(),
            api_family_out: target_family.as_str(),
            prompt_tokens,
            completion_tokens,
            cached_tokens,
            cache_write_tokens,
            cost_usd,
            ttft_ms: None,
            total_ms: elapsed.as_millis() as u64,
            tokens_per_sec: completion_tokens.map(|c| c as f64 / elapsed.as_secs_f64().max(0.001)),
            streamed: false,
            ok: true,
        });

        AttemptOutcome::Success(ProxyResponse::Json {
            status: response.status,
            headers: response.headers,
            body: out_body,
        })
    }
}

fn resolve_target_family(
    provider: &novagate_provider_core::Provider,
    model: &novagate_provider_core::ModelEntry,
    client_family: ApiFamily,
) -> ApiFamily {
    if model.access_via.is_empty() {
        if provider.api_base_url.contains_key(&client_family) {
            return client_family;
        }
        return provider
            .supported_families()
            .next()
            .unwrap_or(client_family);
    }
    if model.access_via.contains(&client_family) {
        return client_family;
    }
    model.access_via[0]
}

fn provider_impl_name(auth: &ProviderAuth) -> &'static str {
    match auth {
        ProviderAuth::ApiKey { .. } => "api_key",
        ProviderAuth::OAuth { provider_kind, .. } => match provider_kind {
            novagate_provider_core::OAuthProviderKind::Codex => "codex",
            novagate_provider_core::OAuthProviderKind::ClaudeCode => "claudecode",
        },
    }
}

fn content_type_for(family: ApiFamily) -> &'static str {
    match family {
        ApiFamily::Gemini => "application/json",
        _ => "text/event-stream",
    }
}

/// Extracts usage tokens from a buffered upstream response body for the
/// common field names each generate-content family uses; falls back to
/// `None` for specialized families (they carry no token usage).
fn extract_usage(family: ApiFamily, body: &Bytes) -> (Option<u64>, Option<u64>, Option<u64>, Option<u64>) {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return (None, None, None, None);
    };
    let usage = match family {
        ApiFamily::Chat | ApiFamily::Responses => value.get("usage"),
        ApiFamily::Messages => value.get("usage"),
        ApiFamily::Gemini => value.get("usageMetadata"),
        _ => None,
    };
    let Some(usage) = usage else {
        return (None, None, None, None);
    };
    let prompt = usage
        .get("prompt_tokens")
        .or_else(|| usage.get("input_tokens"))
        .or_else(|| usage.get("promptTokenCount"))
        .and_then(|v| v.as_u64());
    let completion = usage
        .get("completion_tokens")
        .or_else(|| usage.get("output_tokens"))
        .or_else(|| usage.get("candidatesTokenCount"))
        .and_then(|v| v.as_u64());
    let cached = usage
        .get("cached_tokens")
        .or_else(|| usage.get("cache_read_input_tokens"))
        .and_then(|v| v.as_u64());
    let cache_write = usage.get("cache_creation_input_tokens").and_then(|v| v.as_u64());
    (prompt, completion, cached, cache_write)
}

fn novagate_protocol_transformer(
    src: ApiFamily,
    dst: ApiFamily,
    model: &str,
) -> novagate_transform::StreamTransformer {
    novagate_transform::StreamTransformer::new(src, dst, model)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use novagate_provider_core::{ModelEntry, ModelKind, Pricing, Provider, ProviderAuth};

    use super::*;

    fn provider_with(api_base_url: HashMap<ApiFamily, String>) -> Provider {
        Provider {
            id: "openai".to_string(),
            name: "OpenAI".to_string(),
            enabled: true,
            api_base_url,
            auth: ProviderAuth::ApiKey { key: "sk-test".to_string() },
            headers: vec![],
            extra_body: None,
            discount: None,
            models: HashMap::new(),
        }
    }

    fn model_entry(access_via: Vec<ApiFamily>) -> ModelEntry {
        ModelEntry {
            kind: ModelKind::Chat,
            access_via,
            pricing: Pricing::Simple { input: 0.0, output: 0.0, cached: 0.0 },
            estimate_tokens: false,
        }
    }

    #[test]
    fn resolve_target_family_prefers_client_family_when_model_allows_it() {
        let provider = provider_with(HashMap::from([(ApiFamily::Chat, "https://api.openai.com".to_string())]));
        let model = model_entry(vec![ApiFamily::Chat, ApiFamily::Responses]);
        assert_eq!(resolve_target_family(&provider, &model, ApiFamily::Chat), ApiFamily::Chat);
    }

    #[test]
    fn resolve_target_family_falls_back_to_first_allowed_family() {
        let provider = provider_with(HashMap::from([(ApiFamily::Responses, "https://api.openai.com".to_string())]));
        let model = model_entry(vec![ApiFamily::Responses]);
        assert_eq!(resolve_target_family(&provider, &model, ApiFamily::Chat), ApiFamily::Responses);
    }

    #[test]
    fn resolve_target_family_with_no_access_via_uses_providers_supported_family() {
        let provider = provider_with(HashMap::from([(ApiFamily::Messages, "https://api.anthropic.com".to_string())]));
        let model = model_entry(vec![]);
        assert_eq!(resolve_target_family(&provider, &model, ApiFamily::Chat), ApiFamily::Messages);
    }

    #[test]
    fn provider_impl_name_matches_oauth_kind() {
        assert_eq!(provider_impl_name(&ProviderAuth::ApiKey { key: "x".to_string() }), "api_key");
        assert_eq!(
            provider_impl_name(&ProviderAuth::OAuth {
                provider_kind: novagate_provider_core::OAuthProviderKind::Codex,
                account_id: "acct".to_string(),
            }),
            "codex"
        );
        assert_eq!(
            provider_impl_name(&ProviderAuth::OAuth {
                provider_kind: novagate_provider_core::OAuthProviderKind::ClaudeCode,
                account_id: "acct".to_string(),
            }),
            "claudecode"
        );
    }

    #[test]
    fn content_type_is_json_for_gemini_and_sse_otherwise() {
        assert_eq!(content_type_for(ApiFamily::Gemini), "application/json");
        assert_eq!(content_type_for(ApiFamily::Chat), "text/event-stream");
        assert_eq!(content_type_for(ApiFamily::Messages), "text/event-stream");
    }

    #[test]
    fn extract_usage_reads_openai_style_fields() {
        let body = Bytes::from(
            serde_json::json!({
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": 20,
                    "cached_tokens": 3
                }
            })
            .to_string(),
        );
        let (prompt, completion, cached, cache_write) = extract_usage(ApiFamily::Chat, &body);
        assert_eq!(prompt, Some(10));
        assert_eq!(completion, Some(20));
        assert_eq!(cached, Some(3));
        assert_eq!(cache_write, None);
    }

    #[test]
    fn extract_usage_reads_gemini_usage_metadata() {
        let body = Bytes::from(
            serde_json::json!({
                "usageMetadata": {
                    "promptTokenCount": 5,
                    "candidatesTokenCount": 7
                }
            })
            .to_string(),
        );
        let (prompt, completion, _, _) = extract_usage(ApiFamily::Gemini, &body);
        assert_eq!(prompt, Some(5));
        assert_eq!(completion, Some(7));
    }

    #[test]
    fn extract_usage_is_none_for_specialized_families() {
        let body = Bytes::from(serde_json::json!({ "usage": { "prompt_tokens": 1, "completion_tokens": 1 } }).to_string());
        assert_eq!(extract_usage(ApiFamily::Embeddings, &body), (None, None, None, None));
    }

    #[test]
    fn extract_usage_is_none_for_malformed_json() {
        let body = Bytes::from_static(b"not json");
        assert_eq!(extract_usage(ApiFamily::Chat, &body), (None, None, None, None));
    }
}
