use serde::{Deserialize, Serialize};

/// `POST /v1/audio/speech` (family SPC). The response body is a raw audio
/// byte stream, not JSON, so there is no `SpeechResponse` DTO — the
/// Dispatcher passes the upstream body through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}
