//! In-process cache backend: a `DashMap` guarded by an atomic slot counter so
//! that capacity enforcement is a single compare-exchange rather than a
//! check-then-insert race.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::cache::{NegativeCache, PositiveCache};
use crate::error::CacheError;
use crate::message::DnsMessage;

pub struct MemoryPositiveCache {
    entries: DashMap<String, (DnsMessage, Instant)>,
    count: AtomicUsize,
    max_count: usize,
}

impl MemoryPositiveCache {
    pub fn new(max_count: usize) -> Self {
        MemoryPositiveCache {
            entries: DashMap::new(),
            count: AtomicUsize::new(0),
            max_count,
        }
    }

    fn reserve_slot(&self) -> Result<(), CacheError> {
        loop {
            let current = self.count.load(Ordering::SeqCst);
            if current >= self.max_count {
                return Err(CacheError::full(self.max_count));
            }
            if self
                .count
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    fn release_slot(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PositiveCache for MemoryPositiveCache {
    async fn get(&self, key: &str) -> Option<DnsMessage> {
        let hit = self.entries.get(key).map(|entry| {
            let (message, expires_at) = entry.value();
            (message.clone(), *expires_at)
        });
        match hit {
            Some((message, expires_at)) if expires_at > Instant::now() => Some(message),
            Some(_) => {
                self.remove(key).await;
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: String, message: DnsMessage, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.insert((message, expires_at));
                Ok(())
            }
            Entry::Vacant(vacant) => {
                self.reserve_slot()?;
                vacant.insert((message, expires_at));
                Ok(())
            }
        }
    }

    async fn remove(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.release_slot();
        }
    }

    async fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn is_full(&self) -> bool {
        self.count.load(Ordering::SeqCst) >= self.max_count
    }
}

/// The negative cache stores only an expiration; no payload, no capacity
/// limit (spec names `max-count` for the positive cache only).
pub struct MemoryNegativeCache {
    entries: DashMap<String, Instant>,
}

impl MemoryNegativeCache {
    pub fn new() -> Self {
        MemoryNegativeCache {
            entries: DashMap::new(),
        }
    }
}

impl Default for MemoryNegativeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NegativeCache for MemoryNegativeCache {
    async fn exists(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(expires_at) if *expires_at > Instant::now() => true,
            Some(_) => {
                self.entries.remove(key);
                false
            }
            None => false,
        }
    }

    async fn set(&self, key: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key, Instant::now() + ttl);
        Ok(())
    }

    async fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::ResponseCode;
    use hickory_proto::rr::{DNSClass, RecordType};

    fn msg() -> DnsMessage {
        DnsMessage::new(
            crate::question::Question::new("example.com", RecordType::A, DNSClass::IN),
            vec![],
            ResponseCode::NoError,
        )
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = MemoryPositiveCache::new(10);
        cache
            .set("k".into(), msg(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get("k").await.is_some());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_on_get() {
        let cache = MemoryPositiveCache::new(10);
        cache
            .set("k".into(), msg(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn insert_at_capacity_is_rejected() {
        let cache = MemoryPositiveCache::new(1);
        cache
            .set("a".into(), msg(), Duration::from_secs(60))
            .await
            .unwrap();
        let err = cache
            .set("b".into(), msg(), Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Full(_)));
        assert!(cache.get("a").await.is_some());
    }

    #[tokio::test]
    async fn overwrite_of_existing_key_does_not_consume_a_slot() {
        let cache = MemoryPositiveCache::new(1);
        cache
            .set("a".into(), msg(), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("a".into(), msg(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn negative_cache_expires() {
        let cache = MemoryNegativeCache::new();
        cache.set("k".into(), Duration::from_millis(1)).await.unwrap();
        assert!(cache.exists("k").await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cache.exists("k").await);
    }
}
