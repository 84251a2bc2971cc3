use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::referral::{ReferralProfile, ReferralReward};
use crate::referral::code::candidate_code;
use crate::referral::{
    milestone_credits, RedeemOutcome, ReferralError, ReferralLedger, MAX_CODE_ATTEMPTS,
    SIGNUP_BONUS,
};

#[derive(Default)]
struct Ledger {
    profiles: HashMap<Uuid, ReferralProfile>,
    /// code -> owner. The global uniqueness registry.
    registry: HashMap<String, Uuid>,
    /// referee -> redeemed code. One entry per referee, ever.
    redemptions: HashMap<Uuid, String>,
    rewards: Vec<ReferralReward>,
}

/// In-memory referral ledger. One write lock guards the whole ledger, so
/// every operation is transactional within the process. Volatile; pairs
/// with `MemoryUsageStore` in degraded mode.
#[derive(Default)]
pub struct MemoryReferralLedger {
    inner: RwLock<Ledger>,
}

impl MemoryReferralLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReferralLedger for MemoryReferralLedger {
    async fn issue_code(&self, user_id: Uuid, email: &str) -> Result<String, ReferralError> {
        let mut inner = self.inner.write().await;
        if let Some(profile) = inner.profiles.get(&user_id) {
            return Ok(profile.code.clone());
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = candidate_code(email);
            if inner.registry.contains_key(&candidate) {
                continue;
            }
            inner.registry.insert(candidate.clone(), user_id);
            inner.profiles.insert(
                user_id,
                ReferralProfile {
                    user_id,
                    code: candidate.clone(),
                    total_referrals: 0,
                    bonus_credits_granted: 0,
                    bonus_credits_used: 0,
                    redeemed_code: None,
                    created_at: Utc::now(),
                },
            );
            return Ok(candidate);
        }

        Err(ReferralError::CodeGenerationExhausted(MAX_CODE_ATTEMPTS))
    }

    async fn redeem(
        &self,
        referee_id: Uuid,
        referee_email: &str,
        code: &str,
    ) -> Result<RedeemOutcome, ReferralError> {
        let mut inner = self.inner.write().await;

        let referrer_id = *inner
            .registry
            .get(code)
            .ok_or(ReferralError::CodeNotFound)?;
        if referrer_id == referee_id {
            return Err(ReferralError::SelfReferral);
        }
        if inner.redemptions.contains_key(&referee_id) {
            return Err(ReferralError::AlreadyReferred);
        }
        inner.redemptions.insert(referee_id, code.to_string());

        // Registry entries and profiles are inserted together, so a
        // registered code always resolves to a profile.
        let referrer = match inner.profiles.get_mut(&referrer_id) {
            Some(profile) => profile,
            None => return Err(ReferralError::CodeNotFound),
        };
        referrer.total_referrals += 1;
        let total_referrals = referrer.total_referrals;
        let credits_earned = milestone_credits(total_referrals);
        referrer.bonus_credits_granted += credits_earned;

        if credits_earned > 0 {
            inner.rewards.push(ReferralReward {
                id: Uuid::new_v4(),
                user_id: referrer_id,
                referee_id,
                referee_email: referee_email.to_string(),
                milestone: total_referrals,
                credits_earned,
                created_at: Utc::now(),
            });
        }

        if let Some(referee) = inner.profiles.get_mut(&referee_id) {
            referee.bonus_credits_granted += SIGNUP_BONUS;
            referee.redeemed_code = Some(code.to_string());
        }

        Ok(RedeemOutcome {
            referrer_id,
            total_referrals,
            milestone_reached: credits_earned > 0,
            credits_earned,
            signup_bonus: SIGNUP_BONUS,
        })
    }

    async fn consume_bonus(&self, user_id: Uuid) -> Result<bool, ReferralError> {
        let mut inner = self.inner.write().await;
        match inner.profiles.get_mut(&user_id) {
            Some(profile) if profile.bonus_credits_used < profile.bonus_credits_granted => {
                profile.bonus_credits_used += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn bonus_remaining(&self, user_id: Uuid) -> Result<i64, ReferralError> {
        Ok(self
            .inner
            .read()
            .await
            .profiles
            .get(&user_id)
            .map(ReferralProfile::bonus_remaining)
            .unwrap_or(0))
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<ReferralProfile>, ReferralError> {
        Ok(self.inner.read().await.profiles.get(&user_id).cloned())
    }

    async fn rewards(&self, user_id: Uuid) -> Result<Vec<ReferralReward>, ReferralError> {
        Ok(self
            .inner
            .read()
            .await
            .rewards
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
