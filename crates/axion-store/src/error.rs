/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("key {0} holds a value of the wrong type")]
    WrongType(String),

    #[error("document must be a JSON object")]
    InvalidDocument,

    #[error("subscription closed for topic {0}")]
    Closed(String),
}
