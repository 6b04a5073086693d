use thiserror::Error;

/// Failures raised by a key-value backend.
///
/// These never leave the cache layer: [`crate::cache::KvStore`] turns each of them into a
/// miss or a no-op after logging.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store is unavailable")]
    Unavailable,
    #[error("cache store operation `{op}` timed out")]
    Timeout { op: &'static str },
    #[error("cache store error: {0}")]
    Backend(String),
    #[error("cache payload could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Errors that mean "the store cannot be reached", as opposed to a reachable store that
    /// rejected a command.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout { .. })
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Backend(_) => "backend",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            Self::Unavailable
        } else {
            Self::Backend(err.to_string())
        }
    }
}
