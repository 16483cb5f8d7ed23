pub mod embeddings;
pub mod images;
pub mod speech;
pub mod transcriptions;

pub use embeddings::{EmbeddingObject, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};
pub use images::{ImageGenerationRequest, ImageGenerationResponse, ImageObject};
pub use speech::SpeechRequest;
pub use transcriptions::{TranscriptionRequest, TranscriptionResponse};
