//! Redis-backed cache. Values are serialized with the same trusted DNS codec
//! used on the wire (`hickory_proto::op::Message::to_vec`/`from_vec`) rather
//! than a bespoke format, so the only new "protocol" this backend introduces
//! is the key namespace.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::cache::{NegativeCache, PositiveCache};
use crate::error::CacheError;
use crate::message::DnsMessage;

pub struct RedisPositiveCache {
    conn: ConnectionManager,
    key_prefix: String,
    max_count: usize,
}

impl RedisPositiveCache {
    pub async fn connect(
        url: &str,
        key_prefix: impl Into<String>,
        max_count: usize,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(RedisPositiveCache {
            conn,
            key_prefix: key_prefix.into(),
            max_count,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:pos:{}", self.key_prefix, key)
    }

    /// Key backing the approximate slot counter (see `len`/`is_full`).
    fn count_key(&self) -> String {
        format!("{}:pos:count", self.key_prefix)
    }
}

#[async_trait]
impl PositiveCache for RedisPositiveCache {
    async fn get(&self, key: &str) -> Option<DnsMessage> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn.get(self.namespaced(key)).await.ok()?;
        let raw = raw?;
        let message = hickory_proto::op::Message::from_vec(&raw).ok()?;
        let query = message.queries().first()?.clone();
        let question = crate::question::Question::new(
            &query.name().to_string(),
            query.query_type(),
            query.query_class(),
        );
        Some(DnsMessage::from_wire_message(question, &message))
    }

    async fn set(&self, key: String, message: DnsMessage, ttl: Duration) -> Result<(), CacheError> {
        let query = message
            .question
            .to_query()
            .map_err(|e| CacheError::backend("redis", e.to_string()))?;
        let wire = message.to_wire_message(&query).to_vec()?;
        let mut conn = self.conn.clone();
        let namespaced_key = self.namespaced(&key);

        // Best-effort capacity guard: the counter lives in redis itself (it
        // must be shared across every process pointed at this backend), but
        // the exists-check and the increment below are two round trips, not
        // one atomic operation, so two concurrent inserts at the boundary
        // can both slip through. This is a weaker guarantee than the memory
        // backend's CAS-guarded counter; see DESIGN.md.
        let already_present: bool = conn.exists(&namespaced_key).await.unwrap_or(false);
        if !already_present {
            let count: usize = conn.get(self.count_key()).await.unwrap_or(0);
            if count >= self.max_count {
                return Err(CacheError::full(self.max_count));
            }
        }

        let _: () = conn
            .set_ex(&namespaced_key, wire, ttl.as_secs().max(1))
            .await?;

        if !already_present {
            let _: redis::RedisResult<i64> = conn.incr(self.count_key(), 1).await;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(self.namespaced(key)).await.unwrap_or(0);
        if removed > 0 {
            let _: redis::RedisResult<i64> = conn.decr(self.count_key(), 1).await;
        }
    }

    async fn len(&self) -> usize {
        let mut conn = self.conn.clone();
        conn.get(self.count_key()).await.unwrap_or(0)
    }

    async fn is_full(&self) -> bool {
        self.len().await >= self.max_count
    }
}

pub struct RedisNegativeCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisNegativeCache {
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(RedisNegativeCache {
            conn,
            key_prefix: key_prefix.into(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:neg:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl NegativeCache for RedisNegativeCache {
    async fn exists(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        conn.exists(self.namespaced(key)).await.unwrap_or(false)
    }

    async fn set(&self, key: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.namespaced(&key), 1u8, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) {
        let mut conn = self.conn.clone();
        let _: redis::RedisResult<()> = conn.del(self.namespaced(key)).await;
    }
}
