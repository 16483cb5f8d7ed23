use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiModelList {
    pub models: Vec<GeminiModelObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiModelObject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    #[serde(rename = "inputTokenLimit")]
    pub input_token_limit: u32,
    #[serde(default)]
    #[serde(rename = "outputTokenLimit")]
    pub output_token_limit: u32,
}
