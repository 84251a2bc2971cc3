//! Usage Store — per-user optimization counters behind a narrow trait.
//!
//! Two backends implement it: `PgUsageStore` (durable, atomic increments,
//! consistent across devices) and `MemoryUsageStore` (single-process,
//! volatile, degraded mode only). The backend is selected once at startup
//! via `STORAGE_BACKEND` and everything above the trait is oblivious to the
//! choice.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::usage::Usage;

pub use memory::MemoryUsageStore;
pub use postgres::PgUsageStore;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("usage store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("usage commit for user {user_id} still conflicted after {retries} retries")]
    Conflict { user_id: Uuid, retries: u32 },
}

/// Per-user usage counters, keyed by account id.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Creates a zero-valued record if none exists. Idempotent: an existing
    /// record keeps its counters.
    async fn initialize(&self, user_id: Uuid) -> Result<(), UsageError>;

    /// Current counters. Users with no record read as zero.
    async fn read(&self, user_id: Uuid) -> Result<Usage, UsageError>;

    /// Atomically adds one optimization and `tokens_used` tokens, stamps
    /// `last_optimized_at`, and returns the post-increment counters.
    async fn commit(&self, user_id: Uuid, tokens_used: i64) -> Result<Usage, UsageError>;

    /// Atomically adds `tokens_used` tokens without touching the
    /// optimization count. This is the bonus-funded commit path: a referral
    /// credit pays for the slot, but the tokens still count against the
    /// tier ceiling.
    async fn commit_tokens(&self, user_id: Uuid, tokens_used: i64) -> Result<Usage, UsageError>;
}
