use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::usage::Usage;
use crate::usage::{UsageError, UsageStore};

/// In-memory usage counters.
///
/// Commits serialize behind one async write lock, so updates within the
/// process are never lost. Nothing survives a restart and nothing is shared
/// across instances: degraded/offline mode only, and startup logs say so.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: RwLock<HashMap<Uuid, Usage>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn initialize(&self, user_id: Uuid) -> Result<(), UsageError> {
        self.records.write().await.entry(user_id).or_default();
        Ok(())
    }

    async fn read(&self, user_id: Uuid) -> Result<Usage, UsageError> {
        Ok(self
            .records
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or_default())
    }

    async fn commit(&self, user_id: Uuid, tokens_used: i64) -> Result<Usage, UsageError> {
        let mut records = self.records.write().await;
        let usage = records.entry(user_id).or_default();
        usage.optimization_count += 1;
        usage.total_tokens_consumed += tokens_used;
        usage.last_optimized_at = Some(Utc::now());
        Ok(*usage)
    }

    async fn commit_tokens(&self, user_id: Uuid, tokens_used: i64) -> Result<Usage, UsageError> {
        let mut records = self.records.write().await;
        let usage = records.entry(user_id).or_default();
        usage.total_tokens_consumed += tokens_used;
        usage.last_optimized_at = Some(Utc::now());
        Ok(*usage)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_unknown_user_reads_as_zero() {
        let store = MemoryUsageStore::new();
        let usage = store.read(Uuid::new_v4()).await.unwrap();
        assert_eq!(usage.optimization_count, 0);
        assert_eq!(usage.total_tokens_consumed, 0);
        assert!(usage.last_optimized_at.is_none());
    }

    #[tokio::test]
    async fn test_commit_increments_both_counters() {
        let store = MemoryUsageStore::new();
        let user = Uuid::new_v4();

        let usage = store.commit(user, 5_000).await.unwrap();
        assert_eq!(usage.optimization_count, 1);
        assert_eq!(usage.total_tokens_consumed, 5_000);
        assert!(usage.last_optimized_at.is_some());

        let usage = store.commit(user, 2_500).await.unwrap();
        assert_eq!(usage.optimization_count, 2);
        assert_eq!(usage.total_tokens_consumed, 7_500);
    }

    #[tokio::test]
    async fn test_commit_tokens_leaves_the_count_alone() {
        let store = MemoryUsageStore::new();
        let user = Uuid::new_v4();

        store.commit(user, 5_000).await.unwrap();
        let usage = store.commit_tokens(user, 3_000).await.unwrap();

        assert_eq!(usage.optimization_count, 1);
        assert_eq!(usage.total_tokens_consumed, 8_000);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = MemoryUsageStore::new();
        let user = Uuid::new_v4();

        store.initialize(user).await.unwrap();
        store.commit(user, 1_000).await.unwrap();
        store.initialize(user).await.unwrap();

        let usage = store.read(user).await.unwrap();
        assert_eq!(usage.optimization_count, 1);
        assert_eq!(usage.total_tokens_consumed, 1_000);
    }

    #[tokio::test]
    async fn test_concurrent_commits_lose_no_updates() {
        let store = Arc::new(MemoryUsageStore::new());
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..32_i64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.commit(user, i).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let usage = store.read(user).await.unwrap();
        assert_eq!(usage.optimization_count, 32);
        assert_eq!(usage.total_tokens_consumed, (0..32_i64).sum::<i64>());
    }
}
