//! Common infrastructure library
//!
//! This crate provides the infrastructure shared by the session services:
//! the PostgreSQL pool used as the durable store, the Redis client used as
//! the volatile cache, and their error types.
//!
//! ```rust,no_run
//! use common::cache::{RedisConfig, RedisPool};
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = init_pool(&DatabaseConfig::from_env()).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!
//!     let redis = RedisPool::new(&RedisConfig::from_env())?;
//!     println!("Redis health check: {}", redis.health_check().await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
