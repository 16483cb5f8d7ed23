pub mod chat;
pub mod models;
pub mod responses;

pub use chat::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ChatMessageContent, ChatMessagePart, ChatToolCall, ChatToolChoice, ChatToolDefinition,
};
pub use models::{ModelList, ModelObject};
pub use responses::{
    ResponseContentPart, ResponseInputItem, ResponseObject, ResponseOutputItem,
    ResponseStreamEvent, ResponsesRequest,
};
