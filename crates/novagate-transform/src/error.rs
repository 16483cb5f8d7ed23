use novagate_protocol::ApiFamily;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{family:?} body does not match the expected wire shape: {source}")]
    Malformed {
        family: ApiFamily,
        #[source]
        source: serde_json::Error,
    },
    #[error("{family:?} cannot represent this request: {reason}")]
    UnsupportedContent { family: ApiFamily, reason: String },
    #[error("{0:?} has no generate-content canonical mapping")]
    NotGenerateContent(ApiFamily),
}
