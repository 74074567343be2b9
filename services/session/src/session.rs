//! Session management with a durable store and a cache-aside layer
//!
//! The store is the source of truth. Reads try the cache first and fall back
//! to the store whenever the cache cannot produce a decodable record for the
//! requested key; a successful store read repopulates the cache. Writes hit
//! the store first and then refresh the cache.
//!
//! Every cache write is best effort: its failure is logged and discarded,
//! never returned. Every cache call runs under a child of the request context
//! limited to [`SessionConfig::cache_timeout`], so a slow cache costs at most
//! that long before the manager moves on.

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::{NoCache, TokenCache};
use crate::codec;
use crate::config::SessionConfig;
use crate::context::RequestContext;
use crate::error::{SessionError, SessionResult};
use crate::models::{AccessToken, AccessTokenKey, LoginMetadata};
use crate::store::AccessTokenStore;

/// Reachability of the two backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub store: bool,
    pub cache: bool,
}

/// Session manager owning the access tokens of one project
#[derive(Clone)]
pub struct SessionManager<S, C = NoCache> {
    store: S,
    cache: C,
    config: SessionConfig,
}

impl<S: AccessTokenStore> SessionManager<S, NoCache> {
    /// Create a session manager that reads and writes the store only
    pub fn without_cache(config: SessionConfig, store: S) -> SessionResult<Self> {
        Self::new(config, store, NoCache)
    }
}

impl<S, C> SessionManager<S, C>
where
    S: AccessTokenStore,
    C: TokenCache,
{
    /// Create a new session manager
    pub fn new(config: SessionConfig, store: S, cache: C) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Key of `user_name`'s session in this manager's project
    pub fn key_for(&self, user_name: &str) -> AccessTokenKey {
        AccessTokenKey::new(
            self.config.item_kind.clone(),
            self.config.project_id.clone(),
            user_name,
        )
    }

    /// Register a new login for `user_name`, replacing any previous session.
    ///
    /// A fresh login id is generated and the stored record is returned.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        user_name: &str,
        metadata: LoginMetadata,
    ) -> SessionResult<AccessToken> {
        info!("Creating session for user: {}", user_name);

        let token = AccessToken::new(
            self.config.project_id.clone(),
            user_name,
            Uuid::new_v4().to_string(),
            Utc::now(),
            metadata,
        );
        self.save(ctx, &token).await?;
        Ok(token)
    }

    /// Load the record for `key`, preferring the cache.
    ///
    /// Fails with [`SessionError::NotFound`] when the store has no record.
    pub async fn load(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
    ) -> SessionResult<AccessToken> {
        self.check_key(key)?;

        if let Some(token) = self.read_cache(ctx, key).await {
            debug!(key = %key, "session served from cache");
            return Ok(token);
        }

        let token = self.read_store(ctx, key).await?;
        self.refresh_cache(ctx, &token).await;
        Ok(token)
    }

    /// Whether the store currently holds a record for `key`.
    ///
    /// The cache is not consulted. Lookup failures count as absent.
    pub async fn exists(&self, ctx: &RequestContext, key: &AccessTokenKey) -> bool {
        if self.check_key(key).is_err() {
            return false;
        }
        match ctx.run(self.store.get(ctx, key)).await {
            Ok(Ok(found)) => found.is_some(),
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "existence check failed");
                false
            }
            Err(e) => {
                warn!(key = %key, error = %e, "existence check interrupted");
                false
            }
        }
    }

    /// Store `token` under its key, replacing the previous record entirely.
    ///
    /// The store's error is returned as is; the cache refresh that follows a
    /// successful write cannot fail the call.
    pub async fn save(&self, ctx: &RequestContext, token: &AccessToken) -> SessionResult<()> {
        token.validate()?;
        if token.project_id != self.config.project_id {
            return Err(SessionError::Invalid(format!(
                "record belongs to project {}, manager owns {}",
                token.project_id, self.config.project_id
            )));
        }

        let key = token.key(&self.config.item_kind);
        ctx.run(self.store.put(ctx, &key, token)).await??;
        self.refresh_cache(ctx, token).await;
        Ok(())
    }

    /// Log the session out by clearing its login id. The record is kept.
    pub async fn logout(&self, ctx: &RequestContext, key: &AccessTokenKey) -> SessionResult<()> {
        self.check_key(key)?;
        info!("Logging out session: {}", key);

        let mut token = self.read_store(ctx, key).await?;
        token.clear_login_id();
        self.save(ctx, &token).await
    }

    /// Remove the session from cache and store.
    ///
    /// The cache entry is dropped first so it cannot outlive the record.
    pub async fn delete(&self, ctx: &RequestContext, key: &AccessTokenKey) -> SessionResult<()> {
        self.check_key(key)?;
        info!("Deleting session: {}", key);

        // Best effort: a failed invalidation is logged and discarded.
        let cache_ctx = self.cache_context(ctx);
        let cache_key = key.cache_key();
        let invalidated = cache_ctx
            .run(self.cache.delete(&cache_ctx, &cache_key))
            .await
            .map_err(SessionError::from)
            .and_then(|res| res);
        if let Err(e) = invalidated {
            warn!(key = %key, error = %e, "cache invalidation failed");
        }

        ctx.run(self.store.delete(ctx, key)).await?
    }

    /// Whether `login_id` is the current login of the session at `key`.
    pub async fn is_valid(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
        login_id: &str,
    ) -> bool {
        if login_id.is_empty() {
            return false;
        }
        match self.load(ctx, key).await {
            Ok(token) => token.login_id == login_id,
            Err(e) => {
                debug!(key = %key, error = %e, "session could not be validated");
                false
            }
        }
    }

    /// Write `token` to the cache under its key.
    ///
    /// Best effort: encoding or cache failures are logged and discarded.
    pub async fn refresh_cache(&self, ctx: &RequestContext, token: &AccessToken) {
        let key = token.key(&self.config.item_kind);
        let blob = match codec::encode(token) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(key = %key, error = %e, "session could not be encoded for the cache");
                return;
            }
        };

        let cache_ctx = self.cache_context(ctx);
        let cache_key = key.cache_key();
        let written = cache_ctx
            .run(self.cache.set(
                &cache_ctx,
                &cache_key,
                &blob,
                self.config.cache_expiration,
            ))
            .await
            .map_err(SessionError::from)
            .and_then(|res| res);
        if let Err(e) = written {
            warn!(key = %key, error = %e, "cache refresh failed");
        }
    }

    /// Ping both backends. Never fails; unreachable backends report `false`.
    pub async fn health_check(&self, ctx: &RequestContext) -> HealthStatus {
        let store = match ctx.run(self.store.ping(ctx)).await {
            Ok(Ok(up)) => up,
            Ok(Err(e)) => {
                error!("Store health check failed: {}", e);
                false
            }
            Err(e) => {
                error!("Store health check interrupted: {}", e);
                false
            }
        };

        let cache_ctx = self.cache_context(ctx);
        let cache = match cache_ctx.run(self.cache.ping(&cache_ctx)).await {
            Ok(Ok(up)) => up,
            Ok(Err(e)) => {
                error!("Cache health check failed: {}", e);
                false
            }
            Err(e) => {
                error!("Cache health check interrupted: {}", e);
                false
            }
        };

        HealthStatus { store, cache }
    }

    fn check_key(&self, key: &AccessTokenKey) -> SessionResult<()> {
        if key.project_id() != self.config.project_id || key.kind() != self.config.item_kind {
            return Err(SessionError::Invalid(format!(
                "key {} is outside this manager's scope",
                key
            )));
        }
        Ok(())
    }

    fn cache_context(&self, ctx: &RequestContext) -> RequestContext {
        ctx.limited(self.config.cache_timeout)
    }

    /// Any cache outcome other than a decodable record for `key` is a miss.
    async fn read_cache(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
    ) -> Option<AccessToken> {
        let cache_ctx = self.cache_context(ctx);
        let cache_key = key.cache_key();
        let blob = cache_ctx
            .run(self.cache.get(&cache_ctx, &cache_key))
            .await
            .map_err(SessionError::from)
            .and_then(|res| res);

        let blob = match blob {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, falling back to store");
                return None;
            }
        };

        match codec::decode(&blob) {
            Ok(token) if token.key(&self.config.item_kind) == *key => Some(token),
            Ok(_) => {
                warn!(key = %key, "cached record belongs to another key");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cached record could not be decoded");
                None
            }
        }
    }

    async fn read_store(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
    ) -> SessionResult<AccessToken> {
        ctx.run(self.store.get(ctx, key))
            .await??
            .ok_or_else(|| SessionError::NotFound(key.to_string()))
    }
}
