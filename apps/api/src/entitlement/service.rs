//! Entitlement Service — decides and records optimization spend.
//!
//! `evaluate` is the read-only pre-check and `commit` records a completed
//! optimization. The two share no lock. Two requests racing past evaluate
//! can both commit, overshooting the tier count by one optimization; that
//! is accepted, and commit never turns a completed rewrite into a denial.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::accounts::{AccountError, AccountStore};
use crate::entitlement::policy::{can_optimize, Decision, DenialReason};
use crate::entitlement::tier::{Tier, TierLimits};
use crate::models::usage::Usage;
use crate::referral::{ReferralError, ReferralLedger};
use crate::usage::{UsageError, UsageStore};

const LOG_IN_MESSAGE: &str = "Please log in to optimize your resume.";

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("account {0} not found")]
    AccountNotFound(Uuid),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Referral(#[from] ReferralError),
}

/// Read-only answer to "can this user optimize right now?".
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementSnapshot {
    pub can_optimize: bool,
    /// The next optimization would be funded by a referral bonus credit.
    pub using_bonus: bool,
    pub denial: Option<DenialReason>,
    pub tier: Option<Tier>,
    pub optimization_count: i64,
    pub max_optimizations: i64,
    pub remaining: i64,
    pub tokens_used: i64,
    pub max_tokens: i64,
    pub bonus_remaining: i64,
    /// User-facing explanation when denied or logged out.
    pub message: Option<String>,
}

impl EntitlementSnapshot {
    /// Snapshot for requests without an authenticated user. Everything
    /// reads zero; a missing identity is never treated as a Free account.
    fn logged_out() -> Self {
        Self {
            can_optimize: false,
            using_bonus: false,
            denial: None,
            tier: None,
            optimization_count: 0,
            max_optimizations: 0,
            remaining: 0,
            tokens_used: 0,
            max_tokens: 0,
            bonus_remaining: 0,
            message: Some(LOG_IN_MESSAGE.to_string()),
        }
    }
}

/// Post-commit counters, for display in the response.
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub optimization_count: i64,
    pub total_tokens_consumed: i64,
    pub bonus_remaining: i64,
    pub used_bonus: bool,
}

/// Orchestrates the quota policy over the account, usage, and referral
/// stores. Holds no state of its own beyond the store handles.
#[derive(Clone)]
pub struct EntitlementService {
    accounts: Arc<dyn AccountStore>,
    usage: Arc<dyn UsageStore>,
    referrals: Arc<dyn ReferralLedger>,
}

impl EntitlementService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        usage: Arc<dyn UsageStore>,
        referrals: Arc<dyn ReferralLedger>,
    ) -> Self {
        Self {
            accounts,
            usage,
            referrals,
        }
    }

    /// Non-mutating quota check for one prospective optimization.
    ///
    /// Reads the account tier, the usage counters, and the bonus balance,
    /// then delegates the decision to the quota policy. Denials carry the
    /// user-facing message.
    pub async fn evaluate(
        &self,
        user_id: Option<Uuid>,
        estimated_tokens: i64,
    ) -> Result<EntitlementSnapshot, EntitlementError> {
        let Some(user_id) = user_id else {
            return Ok(EntitlementSnapshot::logged_out());
        };
        // Estimates arrive from the query string; negative values read as zero.
        let estimated_tokens = estimated_tokens.max(0);

        let account = self
            .accounts
            .find(user_id)
            .await?
            .ok_or(EntitlementError::AccountNotFound(user_id))?;
        let tier = account.tier();
        let limits = tier.limits();
        let usage = self.usage.read(user_id).await?;
        let bonus_remaining = self.referrals.bonus_remaining(user_id).await?;

        let decision = can_optimize(&usage, &limits, bonus_remaining, estimated_tokens);
        let (can_optimize, using_bonus, denial, message) = match decision {
            Decision::Allowed { using_bonus } => (true, using_bonus, None, None),
            Decision::Denied { reason } => (
                false,
                false,
                Some(reason),
                Some(denial_message(reason, tier, &limits, &usage)),
            ),
        };

        Ok(EntitlementSnapshot {
            can_optimize,
            using_bonus,
            denial,
            tier: Some(tier),
            optimization_count: usage.optimization_count,
            max_optimizations: limits.max_optimizations,
            remaining: (limits.max_optimizations - usage.optimization_count).max(0),
            tokens_used: usage.total_tokens_consumed,
            max_tokens: limits.max_tokens,
            bonus_remaining,
            message,
        })
    }

    /// Records one completed optimization costing `tokens_used`.
    ///
    /// The pre-commit count is re-read here because evaluate holds no lock.
    /// When the tier allowance is already spent and a bonus credit can be
    /// consumed, the commit is bonus-funded: tokens are added but the tier
    /// count stays put. The credit is consumed before the token write, so a
    /// storage failure in between loses that credit rather than risking a
    /// double spend; the caller surfaces the failure as unsaved work either
    /// way.
    pub async fn commit(
        &self,
        user_id: Uuid,
        tokens_used: i64,
    ) -> Result<CommitOutcome, EntitlementError> {
        let account = self
            .accounts
            .find(user_id)
            .await?
            .ok_or(EntitlementError::AccountNotFound(user_id))?;
        let limits = account.tier().limits();
        let usage = self.usage.read(user_id).await?;

        let tier_exhausted = usage.optimization_count >= limits.max_optimizations;
        let used_bonus = tier_exhausted && self.referrals.consume_bonus(user_id).await?;

        let updated = if used_bonus {
            self.usage.commit_tokens(user_id, tokens_used).await?
        } else {
            self.usage.commit(user_id, tokens_used).await?
        };
        let bonus_remaining = self.referrals.bonus_remaining(user_id).await?;

        info!(
            "Committed optimization for user {user_id}: count={}, tokens={}, bonus_funded={used_bonus}",
            updated.optimization_count, updated.total_tokens_consumed
        );

        Ok(CommitOutcome {
            optimization_count: updated.optimization_count,
            total_tokens_consumed: updated.total_tokens_consumed,
            bonus_remaining,
            used_bonus,
        })
    }
}

fn denial_message(reason: DenialReason, tier: Tier, limits: &TierLimits, usage: &Usage) -> String {
    match reason {
        DenialReason::TierExhausted => match tier {
            Tier::Free => {
                "You've used your 1 free optimization. Upgrade or refer friends to continue."
                    .to_string()
            }
            _ => format!(
                "You've used all {} optimizations. Upgrade to a higher tier or refer friends.",
                limits.max_optimizations
            ),
        },
        DenialReason::TokenExhausted => format!(
            "This optimization would exceed your token limit ({} max, {} used). Upgrade for more tokens.",
            limits.max_tokens, usage.total_tokens_consumed
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::MemoryAccountStore;
    use crate::models::account::NewAccount;
    use crate::referral::MemoryReferralLedger;
    use crate::usage::MemoryUsageStore;

    struct Harness {
        accounts: Arc<MemoryAccountStore>,
        usage: Arc<MemoryUsageStore>,
        referrals: Arc<MemoryReferralLedger>,
        service: EntitlementService,
    }

    fn make_harness() -> Harness {
        let accounts = Arc::new(MemoryAccountStore::new());
        let usage = Arc::new(MemoryUsageStore::new());
        let referrals = Arc::new(MemoryReferralLedger::new());
        let service = EntitlementService::new(
            Arc::clone(&accounts) as Arc<dyn AccountStore>,
            Arc::clone(&usage) as Arc<dyn UsageStore>,
            Arc::clone(&referrals) as Arc<dyn ReferralLedger>,
        );
        Harness {
            accounts,
            usage,
            referrals,
            service,
        }
    }

    async fn provision(h: &Harness, email: &str) -> Uuid {
        let account = h
            .accounts
            .provision(NewAccount {
                external_id: format!("auth0|{email}"),
                email: email.to_string(),
            })
            .await
            .unwrap();
        h.usage.initialize(account.id).await.unwrap();
        h.referrals.issue_code(account.id, email).await.unwrap();
        account.id
    }

    /// Provisions a user holding one signup-bonus credit.
    async fn provision_with_bonus(h: &Harness) -> Uuid {
        let referrer = provision(h, "owner@example.com").await;
        let code = h
            .referrals
            .profile(referrer)
            .await
            .unwrap()
            .unwrap()
            .code;
        let referee = provision(h, "friend@example.com").await;
        h.referrals
            .redeem(referee, "friend@example.com", &code)
            .await
            .unwrap();
        referee
    }

    #[tokio::test]
    async fn test_logged_out_users_are_denied_with_a_message() {
        let h = make_harness();
        let snapshot = h.service.evaluate(None, 1_000).await.unwrap();

        assert!(!snapshot.can_optimize);
        assert!(snapshot.denial.is_none());
        assert_eq!(snapshot.tier, None);
        assert_eq!(snapshot.max_optimizations, 0);
        assert_eq!(snapshot.message.as_deref(), Some(LOG_IN_MESSAGE));
    }

    #[tokio::test]
    async fn test_unknown_account_is_an_error_not_a_free_grant() {
        let h = make_harness();
        let err = h
            .service
            .evaluate(Some(Uuid::new_v4()), 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, EntitlementError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_free_tier_lifecycle() {
        let h = make_harness();
        let user = provision(&h, "solo@example.com").await;

        let snapshot = h.service.evaluate(Some(user), 5_000).await.unwrap();
        assert!(snapshot.can_optimize);
        assert!(!snapshot.using_bonus);
        assert_eq!(snapshot.remaining, 1);

        let outcome = h.service.commit(user, 5_000).await.unwrap();
        assert_eq!(outcome.optimization_count, 1);
        assert_eq!(outcome.total_tokens_consumed, 5_000);
        assert!(!outcome.used_bonus);

        let snapshot = h.service.evaluate(Some(user), 5_000).await.unwrap();
        assert!(!snapshot.can_optimize);
        assert_eq!(snapshot.denial, Some(DenialReason::TierExhausted));
        let message = snapshot.message.unwrap();
        assert!(message.contains("refer friends"), "got: {message}");
    }

    #[tokio::test]
    async fn test_bonus_funded_optimization_spares_the_tier_count() {
        let h = make_harness();
        let user = provision_with_bonus(&h).await;

        // Spend the free-tier slot first.
        h.service.commit(user, 5_000).await.unwrap();

        let snapshot = h.service.evaluate(Some(user), 3_000).await.unwrap();
        assert!(snapshot.can_optimize);
        assert!(snapshot.using_bonus);
        assert_eq!(snapshot.bonus_remaining, 1);

        let outcome = h.service.commit(user, 3_000).await.unwrap();
        assert!(outcome.used_bonus);
        assert_eq!(outcome.optimization_count, 1);
        assert_eq!(outcome.total_tokens_consumed, 8_000);
        assert_eq!(outcome.bonus_remaining, 0);

        // Balance spent: the next check denies.
        let snapshot = h.service.evaluate(Some(user), 3_000).await.unwrap();
        assert!(!snapshot.can_optimize);
        assert_eq!(snapshot.denial, Some(DenialReason::TierExhausted));
    }

    #[tokio::test]
    async fn test_token_ceiling_beats_any_bonus_balance() {
        let h = make_harness();
        let user = provision_with_bonus(&h).await;

        let snapshot = h.service.evaluate(Some(user), 25_000).await.unwrap();
        assert!(!snapshot.can_optimize);
        assert_eq!(snapshot.denial, Some(DenialReason::TokenExhausted));
        let message = snapshot.message.unwrap();
        assert!(message.contains("token limit"), "got: {message}");
    }

    #[tokio::test]
    async fn test_negative_estimates_do_not_reopen_the_token_ceiling() {
        let h = make_harness();
        let user = provision(&h, "clamp@example.com").await;
        h.accounts
            .set_tier(user, Tier::Premium299)
            .await
            .unwrap()
            .unwrap();

        // One in-flight request overshot the soft ceiling.
        h.usage.commit(user, 400_001).await.unwrap();

        let snapshot = h.service.evaluate(Some(user), -10_000).await.unwrap();
        assert!(!snapshot.can_optimize);
        assert_eq!(snapshot.denial, Some(DenialReason::TokenExhausted));
    }

    #[tokio::test]
    async fn test_commit_tolerates_the_evaluate_race() {
        let h = make_harness();
        let user = provision(&h, "racer@example.com").await;

        // Two requests both passed evaluate; both commits must land.
        h.service.commit(user, 1_000).await.unwrap();
        let outcome = h.service.commit(user, 1_000).await.unwrap();
        assert_eq!(outcome.optimization_count, 2);
        assert!(!outcome.used_bonus);
    }

    #[tokio::test]
    async fn test_tier_upgrade_takes_effect_immediately() {
        let h = make_harness();
        let user = provision(&h, "upgrader@example.com").await;

        h.service.commit(user, 5_000).await.unwrap();
        let snapshot = h.service.evaluate(Some(user), 5_000).await.unwrap();
        assert!(!snapshot.can_optimize);

        h.accounts
            .set_tier(user, Tier::Premium299)
            .await
            .unwrap()
            .unwrap();

        let snapshot = h.service.evaluate(Some(user), 5_000).await.unwrap();
        assert!(snapshot.can_optimize);
        assert_eq!(snapshot.max_optimizations, 10);
        assert_eq!(snapshot.remaining, 9);
        assert_eq!(snapshot.max_tokens, 400_000);
    }
}
