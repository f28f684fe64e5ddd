//! Pluggable cache backends.
//!
//! `PositiveCache` stores full answers; `NegativeCache` stores only an
//! expiration marker. Both are implemented by the in-process `memory`
//! backend and the `redis` backend; which one is active is a config-time
//! choice (see `crate::config::CacheBackend`).

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;
use crate::message::DnsMessage;

/// Stores full answers keyed by `Question::cache_key`.
#[async_trait]
pub trait PositiveCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<DnsMessage>;
    async fn set(&self, key: String, message: DnsMessage, ttl: Duration) -> Result<(), CacheError>;
    async fn remove(&self, key: &str);
    async fn len(&self) -> usize;
    async fn is_full(&self) -> bool;
}

/// Stores only "this name recently failed" markers, at half the positive TTL.
#[async_trait]
pub trait NegativeCache: Send + Sync {
    async fn exists(&self, key: &str) -> bool;
    async fn set(&self, key: String, ttl: Duration) -> Result<(), CacheError>;
    async fn remove(&self, key: &str);
}
