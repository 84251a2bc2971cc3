use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One account's referral standing: its shareable code, how many signups it
/// has driven, and the bonus-credit balance those signups earned.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReferralProfile {
    pub user_id: Uuid,
    pub code: String,
    pub total_referrals: i64,
    pub bonus_credits_granted: i64,
    pub bonus_credits_used: i64,
    /// Code this account redeemed at signup, if any.
    pub redeemed_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReferralProfile {
    pub fn bonus_remaining(&self) -> i64 {
        self.bonus_credits_granted - self.bonus_credits_used
    }
}

/// Audit record for one milestone reward grant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReferralReward {
    pub id: Uuid,
    pub user_id: Uuid,
    /// The signup that tipped the referrer over the milestone.
    pub referee_id: Uuid,
    pub referee_email: String,
    pub milestone: i64,
    pub credits_earned: i64,
    pub created_at: DateTime<Utc>,
}
