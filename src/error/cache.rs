//! Errors produced by cache backends.

/// Struct to represent a capacity failure.
#[derive(Debug)]
pub struct FullErrorStruct {
    max_count: usize,
}

/// Struct to represent a remote backend failure (redis, etc).
#[derive(Debug)]
pub struct BackendErrorStruct {
    backend: String,
    msg: String,
}

/// Errors returned by `PositiveCache`/`NegativeCache` implementations.
#[derive(Debug)]
pub enum CacheError {
    /// The backend is at `max-count` and rejected the insert.
    Full(FullErrorStruct),
    /// The backend itself failed (connection, protocol, serialization).
    Backend(BackendErrorStruct),
}

impl CacheError {
    pub fn full(max_count: usize) -> Self {
        CacheError::Full(FullErrorStruct { max_count })
    }

    pub fn backend(backend: impl Into<String>, msg: impl Into<String>) -> Self {
        CacheError::Backend(BackendErrorStruct {
            backend: backend.into(),
            msg: msg.into(),
        })
    }
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Full(e) => write!(f, "cache full (max-count {})", e.max_count),
            CacheError::Backend(e) => write!(f, "{} backend error: {}", e.backend, e.msg),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::backend("redis", err.to_string())
    }
}

impl From<hickory_proto::ProtoError> for CacheError {
    fn from(err: hickory_proto::ProtoError) -> Self {
        CacheError::backend("codec", err.to_string())
    }
}
