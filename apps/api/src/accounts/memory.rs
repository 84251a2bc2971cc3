use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::accounts::{AccountError, AccountStore};
use crate::entitlement::tier::Tier;
use crate::models::account::{Account, NewAccount};

/// In-memory account rows. Volatile; degraded mode only.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn provision(&self, new: NewAccount) -> Result<Account, AccountError> {
        let mut accounts = self.accounts.write().await;
        if let Some(existing) = accounts
            .values()
            .find(|a| a.external_id == new.external_id)
        {
            return Ok(existing.clone());
        }

        let account = Account {
            id: Uuid::new_v4(),
            external_id: new.external_id,
            email: new.email,
            tier: Tier::Free.as_str().to_string(),
            created_at: Utc::now(),
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn set_tier(&self, id: Uuid, tier: Tier) -> Result<Option<Account>, AccountError> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.get_mut(&id).map(|account| {
            account.tier = tier.as_str().to_string();
            account.clone()
        }))
    }
}
