//! Error type shared by every pipeline stage.

/// Failures surfaced by ingestion, retrieval and generation.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// The uploaded document produced no text.
    #[error("Document was empty.")]
    EmptyDocument,
    /// The embedding, vector or completion service failed or is unreachable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The request was malformed.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RagError>;

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::ServiceUnavailable(err.without_url().to_string())
    }
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        RagError::ServiceUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RagError {
    fn from(err: tokio::task::JoinError) -> Self {
        RagError::Internal(format!("background task failed: {}", err))
    }
}
