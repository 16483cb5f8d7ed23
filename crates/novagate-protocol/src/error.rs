use serde::{Deserialize, Serialize};

use crate::ApiFamily;

/// The OpenAI-shaped error envelope, reused by CHAT, RESP, EMB, TRN, SPC,
/// and IMG — every family except MSG and GEM has its own shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiErrorBody {
    pub error: OpenAiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub error: ClaudeErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorBody {
    pub error: GeminiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorDetail {
    pub code: u16,
    pub message: String,
    pub status: String,
}

/// Renders a gateway-classified failure into the error body shape the
/// client's own family expects, so a client never has to special-case
/// talking to novagate versus talking to the upstream directly.
pub fn render_native_error(family: ApiFamily, message: &str, code: &str, status: u16) -> serde_json::Value {
    match family {
        ApiFamily::Messages => serde_json::to_value(ClaudeErrorBody {
            kind: "error".to_string(),
            error: ClaudeErrorDetail {
                kind: code.to_string(),
                message: message.to_string(),
            },
        }),
        ApiFamily::Gemini => serde_json::to_value(GeminiErrorBody {
            error: GeminiErrorDetail {
                code: status,
                message: message.to_string(),
                status: code.to_string(),
            },
        }),
        _ => serde_json::to_value(OpenAiErrorBody {
            error: OpenAiErrorDetail {
                message: message.to_string(),
                kind: code.to_string(),
                param: None,
                code: Some(code.to_string()),
            },
        }),
    }
    .expect("error body types are always representable as JSON")
}
