use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::{
    domain::{entity::auth::TokenBlacklist, repository::TokenBlacklistRepository},
    error::persistence::PersistenceError,
};

pub struct PgTokenBlacklistRepository {
    pool: PgPool,
}

impl PgTokenBlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenBlacklistRepository for PgTokenBlacklistRepository {
    async fn insert(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<TokenBlacklist, PersistenceError> {
        let row = sqlx::query(
            "INSERT INTO token_blacklist (token, expires_at) VALUES ($1, $2) \
             RETURNING id, token, blacklisted_at, expires_at",
        )
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(TokenBlacklist {
            id: row.try_get("id")?,
            token: row.try_get("token")?,
            blacklisted_at: row.try_get("blacklisted_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    async fn is_blacklisted(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM token_blacklist WHERE token = $1 AND expires_at > $2)",
        )
        .bind(token)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
