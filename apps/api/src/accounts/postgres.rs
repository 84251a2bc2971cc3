use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::accounts::{AccountError, AccountStore};
use crate::entitlement::tier::Tier;
use crate::models::account::{Account, NewAccount};

/// Durable account rows on Postgres.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn provision(&self, new: NewAccount) -> Result<Account, AccountError> {
        // DO NOTHING keeps re-provisioning from touching an existing row.
        sqlx::query(
            "INSERT INTO accounts (id, external_id, email) VALUES ($1, $2, $3)
             ON CONFLICT (external_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&new.external_id)
        .bind(&new.email)
        .execute(&self.pool)
        .await?;

        let account: Account = sqlx::query_as("SELECT * FROM accounts WHERE external_id = $1")
            .bind(&new.external_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Account>, AccountError> {
        Ok(sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_tier(&self, id: Uuid, tier: Tier) -> Result<Option<Account>, AccountError> {
        Ok(
            sqlx::query_as("UPDATE accounts SET tier = $2 WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(tier.as_str())
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}
