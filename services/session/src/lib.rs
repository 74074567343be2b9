//! Access-token sessions backed by a durable store and a volatile cache
//!
//! [`SessionManager`] creates, loads, logs out and deletes per-user session
//! records. Records live in an [`AccessTokenStore`] (PostgreSQL in
//! production) and are cached, encoded by [`codec`], in a [`TokenCache`]
//! (Redis in production).
//!
//! ```rust,no_run
//! use common::cache::{RedisConfig, RedisPool};
//! use common::database::{DatabaseConfig, init_pool};
//! use session::{
//!     LoginMetadata, PgAccessTokenStore, RequestContext, SessionConfig, SessionManager,
//! };
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PgAccessTokenStore::new(init_pool(&DatabaseConfig::from_env()).await?);
//!     store.ensure_schema().await?;
//!     let cache = RedisPool::new(&RedisConfig::from_env())?;
//!
//!     let manager = SessionManager::new(SessionConfig::from_env()?, store, cache)?;
//!     let ctx = RequestContext::with_timeout(Duration::from_secs(2));
//!
//!     let token = manager.login(&ctx, "alice", LoginMetadata::default()).await?;
//!     let key = manager.key_for(&token.user_name);
//!     assert!(manager.is_valid(&ctx, &key, &token.login_id).await);
//!     manager.logout(&ctx, &key).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod models;
pub mod session;
pub mod store;

pub use cache::{NoCache, TokenCache};
pub use config::SessionConfig;
pub use context::{Interrupted, RequestContext};
pub use error::{SessionError, SessionResult};
pub use models::{AccessToken, AccessTokenKey, LoginMetadata};
pub use session::{HealthStatus, SessionManager};
pub use store::{AccessTokenStore, PgAccessTokenStore};
