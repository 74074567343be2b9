//! Durable store for access tokens
//!
//! [`AccessTokenStore`] is the source of truth. Implementations must give
//! read-after-write consistency for a single key.

use std::future::Future;

use chrono::DateTime;
use common::database;
use common::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use tracing::info;

use crate::context::RequestContext;
use crate::error::SessionResult;
use crate::models::{AccessToken, AccessTokenKey};

/// Key-value persistence for access tokens
pub trait AccessTokenStore: Send + Sync {
    /// Fetch the record for `key`, `None` when absent.
    fn get(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
    ) -> impl Future<Output = SessionResult<Option<AccessToken>>> + Send;

    /// Store `token` under `key`, replacing any previous record entirely.
    fn put(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
        token: &AccessToken,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Remove the record for `key`. Removing an absent key succeeds.
    fn delete(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Whether the backend is reachable
    fn ping(&self, ctx: &RequestContext) -> impl Future<Output = SessionResult<bool>> + Send {
        let ready = ctx.check().is_ok();
        async move { SessionResult::Ok(ready) }
    }
}

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS access_tokens (
        kind             TEXT        NOT NULL,
        project_id       TEXT        NOT NULL,
        user_name        TEXT        NOT NULL,
        login_time_nanos BIGINT      NOT NULL,
        login_id         TEXT        NOT NULL,
        device_id        TEXT        NOT NULL,
        ip               TEXT        NOT NULL,
        token_type       TEXT        NOT NULL,
        user_agent       TEXT        NOT NULL,
        info             TEXT        NOT NULL,
        updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (kind, project_id, user_name)
    )
"#;

/// Row layout of the `access_tokens` table
#[derive(Debug, FromRow)]
struct AccessTokenRow {
    project_id: String,
    user_name: String,
    login_time_nanos: i64,
    login_id: String,
    device_id: String,
    ip: String,
    token_type: String,
    user_agent: String,
    info: String,
}

impl From<AccessTokenRow> for AccessToken {
    fn from(row: AccessTokenRow) -> Self {
        AccessToken {
            project_id: row.project_id,
            user_name: row.user_name,
            login_time: DateTime::from_timestamp_nanos(row.login_time_nanos),
            login_id: row.login_id,
            device_id: row.device_id,
            ip: row.ip,
            kind: row.token_type,
            user_agent: row.user_agent,
            info: row.info,
        }
    }
}

/// PostgreSQL-backed access-token store
#[derive(Clone)]
pub struct PgAccessTokenStore {
    pool: PgPool,
}

impl PgAccessTokenStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `access_tokens` table if it does not exist
    pub async fn ensure_schema(&self) -> SessionResult<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("access_tokens table is ready");
        Ok(())
    }
}

impl AccessTokenStore for PgAccessTokenStore {
    async fn get(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
    ) -> SessionResult<Option<AccessToken>> {
        ctx.check()?;

        let row = sqlx::query_as::<_, AccessTokenRow>(
            r#"
            SELECT project_id, user_name, login_time_nanos, login_id,
                   device_id, ip, token_type, user_agent, info
            FROM access_tokens
            WHERE kind = $1 AND project_id = $2 AND user_name = $3
            "#,
        )
        .bind(key.kind())
        .bind(key.project_id())
        .bind(key.user_name())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AccessToken::from))
    }

    async fn put(
        &self,
        ctx: &RequestContext,
        key: &AccessTokenKey,
        token: &AccessToken,
    ) -> SessionResult<()> {
        ctx.check()?;
        let login_time_nanos = token.login_time_nanos()?;

        sqlx::query(
            r#"
            INSERT INTO access_tokens (
                kind, project_id, user_name, login_time_nanos, login_id,
                device_id, ip, token_type, user_agent, info
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (kind, project_id, user_name) DO UPDATE SET
                login_time_nanos = EXCLUDED.login_time_nanos,
                login_id         = EXCLUDED.login_id,
                device_id        = EXCLUDED.device_id,
                ip               = EXCLUDED.ip,
                token_type       = EXCLUDED.token_type,
                user_agent       = EXCLUDED.user_agent,
                info             = EXCLUDED.info,
                updated_at       = NOW()
            "#,
        )
        .bind(key.kind())
        .bind(key.project_id())
        .bind(key.user_name())
        .bind(login_time_nanos)
        .bind(&token.login_id)
        .bind(&token.device_id)
        .bind(&token.ip)
        .bind(&token.kind)
        .bind(&token.user_agent)
        .bind(&token.info)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, key: &AccessTokenKey) -> SessionResult<()> {
        ctx.check()?;

        sqlx::query(
            r#"
            DELETE FROM access_tokens
            WHERE kind = $1 AND project_id = $2 AND user_name = $3
            "#,
        )
        .bind(key.kind())
        .bind(key.project_id())
        .bind(key.user_name())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self, ctx: &RequestContext) -> SessionResult<bool> {
        ctx.check()?;
        Ok(database::health_check(&self.pool).await?)
    }
}
