use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user usage counters. Counters only grow; `Default` is the zero-valued
/// record reported for users who have never optimized.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, FromRow)]
pub struct Usage {
    pub optimization_count: i64,
    pub total_tokens_consumed: i64,
    pub last_optimized_at: Option<DateTime<Utc>>,
}
