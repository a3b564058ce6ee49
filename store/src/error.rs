use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("record serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("record not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
