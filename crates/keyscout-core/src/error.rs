use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyscoutError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("corrupt cache entry: {0}")]
    CacheCorruption(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeyscoutError {
    /// Whether the caller may retry the failed request as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeyscoutError::UpstreamTimeout(_)
                | KeyscoutError::Upstream(_)
                | KeyscoutError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, KeyscoutError>;
