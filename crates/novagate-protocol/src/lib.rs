//! Wire-format DTOs for the four transcoder-visible API families (CHAT,
//! RESP, MSG, GEM) plus the specialized single-shape families (EMB, TRN,
//! SPC, IMG), and the canonical intermediate representation `novagate-
//! transform` routes every family pair through.
//!
//! This crate intentionally does **not** depend on axum or any concrete
//! HTTP client — it only describes shapes on the wire.

pub mod canonical;
pub mod claude;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod specialized;
pub mod sse;

/// The eight client-facing API families the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFamily {
    Chat,
    Responses,
    Messages,
    Gemini,
    Embeddings,
    Transcriptions,
    Speech,
    Images,
}

impl ApiFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiFamily::Chat => "chat",
            ApiFamily::Responses => "responses",
            ApiFamily::Messages => "messages",
            ApiFamily::Gemini => "gemini",
            ApiFamily::Embeddings => "embeddings",
            ApiFamily::Transcriptions => "transcriptions",
            ApiFamily::Speech => "speech",
            ApiFamily::Images => "images",
        }
    }

    /// Whether this family participates in cross-family transcoding
    /// through the canonical request/response shapes. The specialized
    /// families have a single shape each and are rewritten header/body-only.
    pub fn is_generate_content(self) -> bool {
        matches!(
            self,
            ApiFamily::Chat | ApiFamily::Responses | ApiFamily::Messages | ApiFamily::Gemini
        )
    }
}
