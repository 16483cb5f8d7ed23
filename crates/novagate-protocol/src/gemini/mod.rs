pub mod generate_content;
pub mod models;

pub use generate_content::{
    GeminiCandidate, GeminiContent, GeminiFunctionCall, GeminiFunctionCallingConfig,
    GeminiFunctionDeclaration, GeminiFunctionResponse, GeminiGenerateContentRequest,
    GeminiGenerateContentResponse, GeminiGenerationConfig, GeminiInlineData, GeminiPart,
    GeminiTool, GeminiToolConfig, GeminiUsageMetadata,
};
pub use models::{GeminiModelList, GeminiModelObject};
