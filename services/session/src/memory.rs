//! In-process store and cache
//!
//! Both adapters keep their data behind an `Arc`, so clones share state. They
//! can be switched offline or slowed down to exercise failure handling.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::cache::TokenCache;
use crate::context::RequestContext;
use crate::error::{SessionError, SessionResult};
use crate::models::{AccessToken, AccessTokenKey};
use crate::store::AccessTokenStore;

/// Store backed by a `HashMap`
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<AccessTokenKey, AccessToken>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`SessionError::OnServer`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn ensure_online(&self, ctx: &RequestContext) -> SessionResult<()> {
        ctx.check()?;
        if self.offline.load(Ordering::SeqCst) {
            return Err(SessionError::OnServer("store is offline".to_string()));
        }
        Ok(())
    }
}

impl AccessTokenStore for InMemoryStore {
    async fn get(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
    ) -> SessionResult<Option<AccessToken>> {
        self.ensure_online(ctx)?;
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn put(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
        token: &AccessToken,
    ) -> SessionResult<()> {
        self.ensure_online(ctx)?;
        self.records.lock().await.insert(key.clone(), token.clone());
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, key: &AccessTokenKey) -> SessionResult<()> {
        self.ensure_online(ctx)?;
        self.records.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self, ctx: &RequestContext) -> SessionResult<bool> {
        Ok(self.ensure_online(ctx).is_ok())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Cache backed by a `HashMap`, honouring per-entry TTLs
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    offline: Arc<AtomicBool>,
    latency: Option<Duration>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it touches the map.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// While offline every call fails with [`SessionError::OnServer`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Write a raw blob, bypassing encoding. Useful for planting stale or corrupt entries.
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.entries.lock().await.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    /// The live blob under `key`, ignoring the offline switch
    pub async fn peek(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    async fn ensure_online(&self, ctx: &RequestContext) -> SessionResult<()> {
        ctx.check()?;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(SessionError::OnServer("cache is offline".to_string()));
        }
        Ok(())
    }
}

impl TokenCache for InMemoryCache {
    async fn get(&self, ctx: &RequestContext, key: &str) -> SessionResult<Option<String>> {
        self.ensure_online(ctx).await?;
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> SessionResult<()> {
        self.ensure_online(ctx).await?;
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> SessionResult<()> {
        self.ensure_online(ctx).await?;
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self, ctx: &RequestContext) -> SessionResult<bool> {
        Ok(self.ensure_online(ctx).await.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoginMetadata;
    use chrono::Utc;

    #[tokio::test(start_paused = true)]
    async fn test_cache_entries_expire() {
        let ctx = RequestContext::new();
        let cache = InMemoryCache::new();
        cache
            .set(&ctx, "k", "v", Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(cache.get(&ctx, "k").await.unwrap(), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(&ctx, "k").await.unwrap(), None);
        assert_eq!(cache.peek("k").await, None);
    }

    #[tokio::test]
    async fn test_offline_cache_fails_every_call() {
        let ctx = RequestContext::new();
        let cache = InMemoryCache::new();
        cache.insert_raw("k", "v").await;
        cache.set_offline(true);

        assert!(cache.get(&ctx, "k").await.is_err());
        assert!(cache.delete(&ctx, "k").await.is_err());
        assert!(!cache.ping(&ctx).await.unwrap());
        assert_eq!(cache.peek("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_store_clones_share_records() {
        let ctx = RequestContext::new();
        let store = InMemoryStore::new();
        let token = AccessToken::new("p", "bob", "t", Utc::now(), LoginMetadata::default());
        let key = token.key("AccessToken");

        store.clone().put(&ctx, &key, &token).await.unwrap();
        assert_eq!(store.get(&ctx, &key).await.unwrap(), Some(token));
        assert_eq!(store.len().await, 1);

        store.delete(&ctx, &key).await.unwrap();
        store.delete(&ctx, &key).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancelled_context_reaches_the_store() {
        let ctx = RequestContext::new();
        ctx.cancellation().cancel();
        let store = InMemoryStore::new();
        let key = AccessTokenKey::new("AccessToken", "p", "bob");

        assert_eq!(
            store.get(&ctx, &key).await,
            Err(SessionError::OnServer("request cancelled".to_string()))
        );
    }
}
