//! A single [`UpstreamProvider`] for every api-key-authenticated upstream:
//! OpenAI-style bearer auth (chat/responses/embeddings/transcriptions/
//! speech/images), Anthropic-style `x-api-key` (messages), and Gemini's
//! `key` query parameter. One vendor config difference away from a dozen
//! near-identical provider structs, so it stays a single type with a
//! per-family `match` rather than per-vendor modules — the canonical IR
//! already did the work of collapsing "op" out of the equation; this
//! collapses "vendor" too, wherever the only real difference is where the
//! key goes.
//!
//! Grounded on `providers/custom/mod.rs`'s `build_url`/`apply_anthropic_
//! headers` helpers and its "validate via a `match` over config, then set
//! headers" shape, adapted from per-op methods down to the crate's single
//! `build_request` entry point now that wire-shape translation lives in
//! `novagate-transform` instead of each provider.

use async_trait::async_trait;
use bytes::Bytes;

use novagate_protocol::ApiFamily;
use novagate_provider_core::{
    Credential, HttpMethod, Provider, ProviderAuth, ProviderError, ProviderResult, UpstreamCtx,
    UpstreamHttpRequest, UpstreamProvider, header_set,
};

const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Default)]
pub struct ApiKeyProvider;

impl ApiKeyProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UpstreamProvider for ApiKeyProvider {
    fn name(&self) -> &'static str {
        "api_key"
    }

    async fn build_request(
        &self,
        ctx: &UpstreamCtx,
        provider: &Provider,
        credential: &Credential,
        body: Bytes,
        stream: bool,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let base_url = provider.api_base_url.get(&ctx.family).ok_or_else(|| {
            ProviderError::InvalidConfig(format!(
                "provider {} has no base url for family {:?}",
                provider.id, ctx.family
            ))
        })?;

        let path = family_path(ctx.family, &ctx.upstream_model, stream);
        let mut url = format!("{}{}", base_url.trim_end_matches('/'), path);

        let mut headers = Vec::new();
        header_set(&mut headers, "content-type", "application/json");
        header_set(&mut headers, "accept", "application/json");

        match ctx.family {
            ApiFamily::Messages => {
                header_set(&mut headers, "x-api-key", credential.bearer_token());
                let version = provider
                    .headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("anthropic-version"))
                    .map(|(_, v)| v.as_str())
                    .unwrap_or(DEFAULT_ANTHROPIC_VERSION);
                header_set(&mut headers, "anthropic-version", version);
            }
            ApiFamily::Gemini => {
                url.push_str(if url.contains('?') { "&" } else { "?" });
                url.push_str("key=");
                url.push_str(&crate::env::resolve(credential.bearer_token()));
            }
            _ => {
                header_set(
                    &mut headers,
                    "authorization",
                    format!("Bearer {}", crate::env::resolve(credential.bearer_token())),
                );
            }
        }

        for (name, value) in &provider.headers {
            if name.eq_ignore_ascii_case("anthropic-version") {
                continue;
            }
            header_set(&mut headers, name, crate::env::resolve(value));
        }

        let body = merge_extra_body(body, provider.extra_body.as_ref())?;

        Ok(UpstreamHttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(body),
            is_stream: stream,
        })
    }
}

fn family_path(family: ApiFamily, model: &str, stream: bool) -> String {
    match family {
        ApiFamily::Chat => "/v1/chat/completions".to_string(),
        ApiFamily::Responses => "/v1/responses".to_string(),
        ApiFamily::Messages => "/v1/messages".to_string(),
        ApiFamily::Gemini => {
            let method = if stream {
                "streamGenerateContent"
            } else {
                "generateContent"
            };
            format!("/v1beta/models/{model}:{method}")
        }
        ApiFamily::Embeddings => "/v1/embeddings".to_string(),
        ApiFamily::Transcriptions => "/v1/audio/transcriptions".to_string(),
        ApiFamily::Speech => "/v1/audio/speech".to_string(),
        ApiFamily::Images => "/v1/images/generations".to_string(),
    }
}

/// Fills in any top-level field the client didn't already set; a configured
/// default, not an override the gateway forces onto every request.
fn merge_extra_body(
    body: Bytes,
    extra: Option<&serde_json::Value>,
) -> ProviderResult<Bytes> {
    let Some(extra) = extra.and_then(|v| v.as_object()) else {
        return Ok(body);
    };
    if extra.is_empty() {
        return Ok(body);
    }
    let mut value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|err| ProviderError::Other(format!("request body is not valid json: {err}")))?;
    let Some(obj) = value.as_object_mut() else {
        return Ok(body);
    };
    for (key, v) in extra {
        obj.entry(key.clone()).or_insert_with(|| v.clone());
    }
    serde_json::to_vec(&value)
        .map(Bytes::from)
        .map_err(|err| ProviderError::Other(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn provider(family: ApiFamily, base_url: &str, auth: ProviderAuth) -> Provider {
        let mut api_base_url = HashMap::new();
        api_base_url.insert(family, base_url.to_string());
        Provider {
            id: "openai-main".to_string(),
            name: "OpenAI".to_string(),
            enabled: true,
            api_base_url,
            auth,
            headers: Vec::new(),
            extra_body: None,
            discount: None,
            models: HashMap::new(),
        }
    }

    fn ctx(family: ApiFamily) -> UpstreamCtx {
        UpstreamCtx {
            trace_id: None,
            provider_id: "openai-main".to_string(),
            upstream_model: "gpt-5".to_string(),
            family,
            attempt_no: 0,
        }
    }

    #[tokio::test]
    async fn chat_family_uses_bearer_auth() {
        let p = ApiKeyProvider::new();
        let provider = provider(
            ApiFamily::Chat,
            "https://api.openai.com",
            ProviderAuth::ApiKey {
                key: "{env:OPENAI_KEY}".to_string(),
            },
        );
        let credential = Credential::ApiKey(novagate_provider_core::ApiKeyCredential {
            api_key: "sk-test".to_string(),
        });
        let req = p
            .build_request(&ctx(ApiFamily::Chat), &provider, &credential, Bytes::from("{}"), false)
            .await
            .unwrap();
        assert_eq!(req.url, "https://api.openai.com/v1/chat/completions");
        assert!(
            req.headers
                .iter()
                .any(|(k, v)| k == "authorization" && v == "Bearer sk-test")
        );
    }

    #[tokio::test]
    async fn messages_family_uses_x_api_key_and_version_header() {
        let p = ApiKeyProvider::new();
        let provider = provider(
            ApiFamily::Messages,
            "https://api.anthropic.com",
            ProviderAuth::ApiKey {
                key: "sk-ant".to_string(),
            },
        );
        let credential = Credential::ApiKey(novagate_provider_core::ApiKeyCredential {
            api_key: "sk-ant".to_string(),
        });
        let req = p
            .build_request(
                &ctx(ApiFamily::Messages),
                &provider,
                &credential,
                Bytes::from("{}"),
                false,
            )
            .await
            .unwrap();
        assert_eq!(req.url, "https://api.anthropic.com/v1/messages");
        assert!(req.headers.iter().any(|(k, v)| k == "x-api-key" && v == "sk-ant"));
        assert!(
            req.headers
                .iter()
                .any(|(k, v)| k == "anthropic-version" && v == DEFAULT_ANTHROPIC_VERSION)
        );
    }

    #[tokio::test]
    async fn gemini_family_appends_key_query_param() {
        let p = ApiKeyProvider::new();
        let provider = provider(
            ApiFamily::Gemini,
            "https://generativelanguage.googleapis.com",
            ProviderAuth::ApiKey {
                key: "goog-key".to_string(),
            },
        );
        let credential = Credential::ApiKey(novagate_provider_core::ApiKeyCredential {
            api_key: "goog-key".to_string(),
        });
        let req = p
            .build_request(
                &ctx(ApiFamily::Gemini),
                &provider,
                &credential,
                Bytes::from("{}"),
                true,
            )
            .await
            .unwrap();
        assert_eq!(
            req.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gpt-5:streamGenerateContent?key=goog-key"
        );
    }

    #[test]
    fn merge_extra_body_fills_missing_fields_only() {
        let extra = serde_json::json!({ "temperature": 0.5, "model": "ignored" });
        let body = Bytes::from(r#"{"model":"gpt-5"}"#);
        let merged = merge_extra_body(body, Some(&extra)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&merged).unwrap();
        assert_eq!(value["model"], "gpt-5");
        assert_eq!(value["temperature"], 0.5);
    }
}
