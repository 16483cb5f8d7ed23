pub mod messages;
pub mod models;

pub use messages::{
    ClaudeContentBlock, ClaudeDelta, ClaudeImageSource, ClaudeMessage, ClaudeMessageContent,
    ClaudeMessageDelta, ClaudeMessagesRequest, ClaudeMessagesResponse, ClaudeStreamEvent,
    ClaudeSystemPrompt, ClaudeTool, ClaudeToolChoice, ClaudeToolResultContent, ClaudeUsage,
};
pub use models::{ClaudeModelList, ClaudeModelObject};
