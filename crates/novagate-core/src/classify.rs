//! Classifies an inbound request into the pieces the Dispatcher needs:
//! which wire family it spoke, whether it asked to stream, and which
//! alias or passthrough target it named.
//!
//! `novagate-transform` already collapsed per-operation handling behind the
//! canonical IR, so this module only needs to resolve *family* and
//! *stream*, not a typed operation enum covering every request shape.

use serde_json::Value as Json;

use novagate_protocol::ApiFamily;

use crate::error::ProxyError;

#[derive(Debug, Clone)]
pub struct ClassifiedRequest {
    pub family: ApiFamily,
    pub stream: bool,
    /// The client's `model` field value: an alias id, an additional alias,
    /// or a `provider/model` passthrough target.
    pub requested_model: String,
    pub body: Json,
}

/// Classifies a request given its path and raw body. `path` is the axum
/// route's matched pattern (e.g. `/v1/chat/completions`), not the literal
/// request URI, except for the Gemini route where the `{model}:{method}`
/// segment is passed separately.
pub fn classify_generate_content(
    request_id: &str,
    family: ApiFamily,
    body: &[u8],
) -> Result<ClassifiedRequest, ProxyError> {
    let json: Json = serde_json::from_slice(body)
        .map_err(|err| ProxyError::bad_request(request_id, format!("invalid json body: {err}")))?;

    let requested_model = json
        .get("model")
        .and_then(Json::as_str)
        .ok_or_else(|| ProxyError::bad_request(request_id, "missing \"model\" field"))?
        .to_string();

    let stream = json.get("stream").and_then(Json::as_bool).unwrap_or(false);

    Ok(ClassifiedRequest {
        family,
        stream,
        requested_model,
        body: json,
    })
}

/// Gemini's stream preference rides on the path suffix, not a body field.
pub fn classify_gemini(
    request_id: &str,
    model_and_method: &str,
    body: &[u8],
) -> Result<ClassifiedRequest, ProxyError> {
    let (model, method) = model_and_method.split_once(':').ok_or_else(|| {
        ProxyError::bad_request(request_id, "expected \"{model}:{method}\" path segment")
    })?;
    let stream = match method {
        "streamGenerateContent" => true,
        "generateContent" => false,
        other => {
            return Err(ProxyError::bad_request(
                request_id,
                format!("unsupported gemini method: {other}"),
            ));
        }
    };

    let mut json: Json = serde_json::from_slice(body)
        .map_err(|err| ProxyError::bad_request(request_id, format!("invalid json body: {err}")))?;
    if let Some(obj) = json.as_object_mut() {
        obj.entry("model").or_insert_with(|| Json::String(model.to_string()));
    }

    Ok(ClassifiedRequest {
        family: ApiFamily::Gemini,
        stream,
        requested_model: model.to_string(),
        body: json,
    })
}

/// The specialised single-shape families never stream and carry `model`
/// the same way the generate-content families do.
pub fn classify_specialized(
    request_id: &str,
    family: ApiFamily,
    body: &[u8],
) -> Result<ClassifiedRequest, ProxyError> {
    let json: Json = serde_json::from_slice(body)
        .map_err(|err| ProxyError::bad_request(request_id, format!("invalid json body: {err}")))?;
    let requested_model = json
        .get("model")
        .and_then(Json::as_str)
        .ok_or_else(|| ProxyError::bad_request(request_id, "missing \"model\" field"))?
        .to_string();

    Ok(ClassifiedRequest {
        family,
        stream: false,
        requested_model,
        body: json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_stream_flag_comes_from_body() {
        let body = br#"{"model":"fast","stream":true}"#;
        let classified = classify_generate_content("req1", ApiFamily::Chat, body).unwrap();
        assert!(classified.stream);
        assert_eq!(classified.requested_model, "fast");
    }

    #[test]
    fn gemini_stream_flag_comes_from_path_suffix() {
        let body = br#"{}"#;
        let classified = classify_gemini("req1", "gemini-pro:streamGenerateContent", body).unwrap();
        assert!(classified.stream);
        assert_eq!(classified.requested_model, "gemini-pro");
        assert_eq!(classified.body["model"], "gemini-pro");
    }

    #[test]
    fn missing_model_field_is_bad_request() {
        let body = br#"{"stream":false}"#;
        let err = classify_generate_content("req1", ApiFamily::Chat, body).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ClientBadRequest);
    }
}
