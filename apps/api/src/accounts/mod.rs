//! Account Store — identity rows and tier transitions.

pub mod handlers;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::entitlement::tier::Tier;
use crate::models::account::{Account, NewAccount};

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates the account on first login, or returns the existing one.
    /// Idempotent keyed by `external_id`; re-provisioning never resets
    /// anything.
    async fn provision(&self, new: NewAccount) -> Result<Account, AccountError>;

    async fn find(&self, id: Uuid) -> Result<Option<Account>, AccountError>;

    /// Moves the account to `tier`. `None` if the account does not exist.
    async fn set_tier(&self, id: Uuid, tier: Tier) -> Result<Option<Account>, AccountError>;
}
