/// Postgres-backed token store
///
/// Records live in `refresh_tokens`. Only the SHA-256 digest of a token is
/// persisted; lookups hash the presented value first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::{NewRenewalToken, RenewalTokenRecord, TokenStore};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Hash a refresh token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_record(row: (Uuid, Uuid, DateTime<Utc>), token_value: &str) -> RenewalTokenRecord {
    let (id, owner_id, expires_at) = row;
    RenewalTokenRecord {
        id,
        owner_id,
        token_value: token_value.to_string(),
        expires_at,
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn find_by_owner_and_token(
        &self,
        owner_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RenewalTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, Uuid, DateTime<Utc>)>(
            r#"
            SELECT id, user_id, expires_at
            FROM refresh_tokens
            WHERE user_id = $1 AND token_hash = $2
            "#,
        )
        .bind(owner_id)
        .bind(hash_token(token_value))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| to_record(row, token_value)))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn take_by_owner_and_token(
        &self,
        owner_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RenewalTokenRecord>, StoreError> {
        // A single DELETE ... RETURNING: concurrent callers serialize on the
        // row lock and only the first sees the row.
        let row = sqlx::query_as::<_, (Uuid, Uuid, DateTime<Utc>)>(
            r#"
            DELETE FROM refresh_tokens
            WHERE user_id = $1 AND token_hash = $2
            RETURNING id, user_id, expires_at
            "#,
        )
        .bind(owner_id)
        .bind(hash_token(token_value))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| to_record(row, token_value)))
    }

    async fn create(&self, token: NewRenewalToken) -> Result<RenewalTokenRecord, StoreError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(token.owner_id)
        .bind(hash_token(&token.token_value))
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(RenewalTokenRecord {
            id,
            owner_id: token.owner_id,
            token_value: token.token_value,
            expires_at: token.expires_at,
        })
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id = %owner_id, count = result.rows_affected(), "Refresh tokens deleted for user");
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hashing() {
        let hash1 = hash_token("some.jwt.value");
        let hash2 = hash_token("some.jwt.value");

        // Same token should produce same hash
        assert_eq!(hash1, hash2);
        // Hash should not equal plaintext
        assert_ne!(hash1, "some.jwt.value");
        // Hash should be 64 chars (SHA-256 hex)
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        assert_ne!(hash_token("token-1"), hash_token("token-2"));
    }
}
