use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::referral::{ReferralProfile, ReferralReward};
use crate::referral::code::candidate_code;
use crate::referral::{
    milestone_credits, RedeemOutcome, ReferralError, ReferralLedger, MAX_CODE_ATTEMPTS,
    SIGNUP_BONUS,
};

/// Durable referral ledger on Postgres.
///
/// Redemption runs inside one transaction; the per-referee redemption row is
/// the idempotency guard, so a retried or duplicated redemption can never
/// double-count or double-grant. Bonus consumption is a single conditional
/// update and needs no transaction.
#[derive(Clone)]
pub struct PgReferralLedger {
    pool: PgPool,
}

impl PgReferralLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralLedger for PgReferralLedger {
    async fn issue_code(&self, user_id: Uuid, email: &str) -> Result<String, ReferralError> {
        let existing: Option<String> =
            sqlx::query_scalar("SELECT code FROM referral_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        if let Some(code) = existing {
            return Ok(code);
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = candidate_code(email);
            let mut tx = self.pool.begin().await?;

            let claimed = sqlx::query(
                "INSERT INTO referral_codes (code, owner_user_id) VALUES ($1, $2)
                 ON CONFLICT (code) DO NOTHING",
            )
            .bind(&candidate)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            if claimed.rows_affected() == 0 {
                // Candidate already taken. Roll back and mint another.
                tx.rollback().await?;
                continue;
            }

            let inserted = sqlx::query(
                "INSERT INTO referral_profiles (user_id, code) VALUES ($1, $2)
                 ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(&candidate)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                // Lost a concurrent first-login race. The rollback releases
                // our candidate; the winner's code is authoritative.
                tx.rollback().await?;
                let code: String =
                    sqlx::query_scalar("SELECT code FROM referral_profiles WHERE user_id = $1")
                        .bind(user_id)
                        .fetch_one(&self.pool)
                        .await?;
                return Ok(code);
            }

            tx.commit().await?;
            info!("Issued referral code {candidate} to user {user_id}");
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
        let mut tx = self.pool.begin().await?;

        // 1. Resolve the code to its owner.
        let referrer_id: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_user_id FROM referral_codes WHERE code = $1")
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?;
        let referrer_id = referrer_id.ok_or(ReferralError::CodeNotFound)?;

        // 2. Accounts cannot refer themselves.
        if referrer_id == referee_id {
            return Err(ReferralError::SelfReferral);
        }

        // 3. One redemption per referee, ever. The insert is the guard.
        let recorded = sqlx::query(
            "INSERT INTO referral_redemptions (referee_id, referee_email, code, referrer_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (referee_id) DO NOTHING",
        )
        .bind(referee_id)
        .bind(referee_email)
        .bind(code)
        .bind(referrer_id)
        .execute(&mut *tx)
        .await?;
        if recorded.rows_affected() == 0 {
            return Err(ReferralError::AlreadyReferred);
        }

        // 4. Count the referral for the owner.
        let total_referrals: i64 = sqlx::query_scalar(
            "UPDATE referral_profiles SET total_referrals = total_referrals + 1
             WHERE user_id = $1
             RETURNING total_referrals",
        )
        .bind(referrer_id)
        .fetch_one(&mut *tx)
        .await?;

        // 5. Milestone reward, with an audit row.
        let credits_earned = milestone_credits(total_referrals);
        if credits_earned > 0 {
            sqlx::query(
                "UPDATE referral_profiles
                 SET bonus_credits_granted = bonus_credits_granted + $2
                 WHERE user_id = $1",
            )
            .bind(referrer_id)
            .bind(credits_earned)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO referral_rewards
                     (id, user_id, referee_id, referee_email, milestone, credits_earned)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(referrer_id)
            .bind(referee_id)
            .bind(referee_email)
            .bind(total_referrals)
            .bind(credits_earned)
            .execute(&mut *tx)
            .await?;
        }

        // 6. Flat signup bonus for the referee.
        sqlx::query(
            "UPDATE referral_profiles
             SET bonus_credits_granted = bonus_credits_granted + $2, redeemed_code = $3
             WHERE user_id = $1",
        )
        .bind(referee_id)
        .bind(SIGNUP_BONUS)
        .bind(code)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if credits_earned > 0 {
            info!(
                "Referral milestone: user {referrer_id} reached {total_referrals} referrals, \
                 granted {credits_earned} bonus credits"
            );
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
        // Conditional increment: consumes exactly one credit or nothing.
        let updated = sqlx::query(
            "UPDATE referral_profiles
             SET bonus_credits_used = bonus_credits_used + 1
             WHERE user_id = $1 AND bonus_credits_used < bonus_credits_granted",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() == 1)
    }

    async fn bonus_remaining(&self, user_id: Uuid) -> Result<i64, ReferralError> {
        let remaining: Option<i64> = sqlx::query_scalar(
            "SELECT bonus_credits_granted - bonus_credits_used
             FROM referral_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(remaining.unwrap_or(0))
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<ReferralProfile>, ReferralError> {
        Ok(
            sqlx::query_as("SELECT * FROM referral_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn rewards(&self, user_id: Uuid) -> Result<Vec<ReferralReward>, ReferralError> {
        Ok(sqlx::query_as(
            "SELECT * FROM referral_rewards WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
