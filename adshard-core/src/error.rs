use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("shard {shard} failed: {message}")]
    Shard { shard: usize, message: String },

    #[error("shard {shard} operation timed out")]
    Timeout { shard: usize },

    #[error("impression queue is full")]
    QueueFull,

    #[error("impression queue is closed")]
    QueueClosed,

    #[error("stop cascade for banner {banner_id} failed: {failures:?}")]
    Cascade {
        banner_id: u64,
        failures: Vec<String>,
    },

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AdError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Network, timeout and backend failures that a later attempt may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Shard { .. }
                | Self::Timeout { .. }
                | Self::Redis(_)
                | Self::Sqlite(_)
                | Self::Io(_)
        )
    }
}

impl From<tokio::task::JoinError> for AdError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Internal(format!("task failed: {}", error))
    }
}

pub type Result<T> = std::result::Result<T, AdError>;
