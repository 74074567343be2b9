//! Volatile cache for encoded access tokens
//!
//! A [`TokenCache`] holds encoded records keyed by the string form of an
//! [`AccessTokenKey`](crate::models::AccessTokenKey). It may evict entries or
//! be unreachable at any time; the session manager treats every failure as a
//! miss on reads and discards failures on writes.

use std::future::Future;
use std::time::Duration;

use common::cache::RedisPool;

use crate::context::RequestContext;
use crate::error::SessionResult;

/// Key-value cache with per-entry expiration
pub trait TokenCache: Send + Sync {
    /// Fetch the blob cached under `key`, `None` on a miss.
    fn get(
        &self,
        ctx: &RequestContext,
        key: &str,
    ) -> impl Future<Output = SessionResult<Option<String>>> + Send;

    /// Cache `value` under `key`. `ttl == None` keeps the entry until evicted.
    fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Drop the entry for `key`, if any.
    fn delete(
        &self,
        ctx: &RequestContext,
        key: &str,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Whether the backend is reachable
    fn ping(&self, ctx: &RequestContext) -> impl Future<Output = SessionResult<bool>> + Send {
        let ready = ctx.check().is_ok();
        async move { SessionResult::Ok(ready) }
    }
}

/// Whole seconds for a Redis expiry, rounded up so short TTLs do not become zero.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

impl TokenCache for RedisPool {
    async fn get(&self, ctx: &RequestContext, key: &str) -> SessionResult<Option<String>> {
        ctx.check()?;
        Ok(RedisPool::get(self, key).await?)
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> SessionResult<()> {
        ctx.check()?;
        Ok(RedisPool::set(self, key, value, ttl.map(ttl_seconds)).await?)
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> SessionResult<()> {
        ctx.check()?;
        Ok(RedisPool::delete(self, key).await?)
    }

    async fn ping(&self, ctx: &RequestContext) -> SessionResult<bool> {
        ctx.check()?;
        Ok(self.health_check().await?)
    }
}

/// A cache that never holds anything; every read misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl TokenCache for NoCache {
    async fn get(&self, _ctx: &RequestContext, _key: &str) -> SessionResult<Option<String>> {
        Ok(None)
    }

    async fn set(
        &self,
        _ctx: &RequestContext,
        _key: &str,
        _value: &str,
        _ttl: Option<Duration>,
    ) -> SessionResult<()> {
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, _key: &str) -> SessionResult<()> {
        Ok(())
    }
}
