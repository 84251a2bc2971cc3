use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::usage::Usage;
use crate::usage::{UsageError, UsageStore};

/// Retries for commits that hit transient serialization failures.
const MAX_COMMIT_RETRIES: u32 = 3;

/// Durable usage counters on Postgres.
///
/// Commits are single atomic upserts, so concurrent commits for one user
/// serialize on the row and both increments land. Read-modify-write is
/// deliberately absent from this file.
#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        count_delta: i64,
        tokens: i64,
    ) -> Result<Usage, sqlx::Error> {
        sqlx::query_as::<_, Usage>(
            r#"
            INSERT INTO usage_counters (user_id, optimization_count, total_tokens_consumed, last_optimized_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                optimization_count = usage_counters.optimization_count + EXCLUDED.optimization_count,
                total_tokens_consumed = usage_counters.total_tokens_consumed + EXCLUDED.total_tokens_consumed,
                last_optimized_at = NOW()
            RETURNING optimization_count, total_tokens_consumed, last_optimized_at
            "#,
        )
        .bind(user_id)
        .bind(count_delta)
        .bind(tokens)
        .fetch_one(&self.pool)
        .await
    }

    async fn commit_with_retries(
        &self,
        user_id: Uuid,
        count_delta: i64,
        tokens: i64,
    ) -> Result<Usage, UsageError> {
        for attempt in 1..=MAX_COMMIT_RETRIES {
            match self.upsert(user_id, count_delta, tokens).await {
                Ok(usage) => return Ok(usage),
                Err(e) if is_serialization_failure(&e) => {
                    warn!("Usage commit attempt {attempt} for user {user_id} conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(UsageError::Conflict {
            user_id,
            retries: MAX_COMMIT_RETRIES,
        })
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn initialize(&self, user_id: Uuid) -> Result<(), UsageError> {
        sqlx::query(
            "INSERT INTO usage_counters (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read(&self, user_id: Uuid) -> Result<Usage, UsageError> {
        let usage: Option<Usage> = sqlx::query_as(
            "SELECT optimization_count, total_tokens_consumed, last_optimized_at
             FROM usage_counters WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(usage.unwrap_or_default())
    }

    async fn commit(&self, user_id: Uuid, tokens_used: i64) -> Result<Usage, UsageError> {
        self.commit_with_retries(user_id, 1, tokens_used).await
    }

    async fn commit_tokens(&self, user_id: Uuid, tokens_used: i64) -> Result<Usage, UsageError> {
        self.commit_with_retries(user_id, 0, tokens_used).await
    }
}

/// Postgres reports serialization failures as SQLSTATE 40001 and deadlocks
/// as 40P01. Additive commits are safe to retry on either.
fn is_serialization_failure(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001") | Some("40P01")),
        _ => false,
    }
}
