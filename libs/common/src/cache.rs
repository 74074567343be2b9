//! Redis cache module
//!
//! This module provides the Redis client used as the volatile session cache:
//! get, set with an optional TTL, delete and a health check. All clones of a
//! [`RedisPool`] share one multiplexed connection, opened on first use and
//! reopened after it drops. Connects and responses are bounded by the
//! configured timeouts, so an unreachable Redis surfaces as a [`CacheError`]
//! instead of a hang.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{CacheError, CacheResult};

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Timeout for establishing a connection, in milliseconds
    pub connection_timeout_ms: u64,
    /// Timeout for a single command response, in milliseconds
    pub response_timeout_ms: u64,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_CONNECTION_TIMEOUT_MS`: Connection timeout (default: 500)
    /// - `REDIS_RESPONSE_TIMEOUT_MS`: Response timeout (default: 200)
    pub fn from_env() -> Self {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let connection_timeout_ms = std::env::var("REDIS_CONNECTION_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);
        let response_timeout_ms = std::env::var("REDIS_RESPONSE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        RedisConfig {
            url,
            connection_timeout_ms,
            response_timeout_ms,
        }
    }
}

/// Redis client handle, cheap to clone
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
    connection_timeout: Duration,
    response_timeout: Duration,
}

impl RedisPool {
    /// Create the Redis client. No connection is opened until the first command.
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.clone()).map_err(CacheError::Connection)?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool {
            client,
            connection: Arc::new(Mutex::new(None)),
            connection_timeout: Duration::from_millis(config.connection_timeout_ms),
            response_timeout: Duration::from_millis(config.response_timeout_ms),
        })
    }

    /// Shared connection, opened if there is none yet
    async fn get_connection(&self) -> CacheResult<MultiplexedConnection> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(
                self.response_timeout,
                self.connection_timeout,
            )
            .await
            .map_err(CacheError::Connection)?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Map a failed command, dropping the shared connection if it is broken.
    async fn command_error(&self, err: RedisError) -> CacheError {
        if err.is_connection_dropped() || err.is_io_error() || err.is_timeout() {
            warn!("Redis connection lost, reconnecting on next command: {}", err);
            self.connection.lock().await.take();
        }
        CacheError::Command(err)
    }

    /// Set a key-value pair in Redis with optional TTL in seconds
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;

        let result: redis::RedisResult<()> = match ttl_seconds {
            Some(ttl) => conn.set_ex(key, value, ttl).await,
            None => conn.set(key, value).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.command_error(e).await),
        }
    }

    /// Get a value from Redis by key
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<Option<String>> = conn.get(key).await;
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.command_error(e).await),
        }
    }

    /// Delete a key from Redis
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<u64> = conn.del(key).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(self.command_error(e).await),
        }
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(pong) => Ok(pong == "PONG"),
            Err(e) => Err(self.command_error(e).await),
        }
    }
}
