//! Referral Ledger — codes, redemptions, milestone rewards, and the
//! bonus-credit balance they fund.
//!
//! Every account gets a shareable code at provisioning. A redemption counts
//! toward the referrer's total and grants the referee a one-credit signup
//! bonus; each fifth referral grants the referrer five more credits. Bonus
//! credits extend the optimization count only. Token ceilings ignore them.

pub mod code;
pub mod handlers;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::referral::{ReferralProfile, ReferralReward};

pub use memory::MemoryReferralLedger;
pub use postgres::PgReferralLedger;

/// Referral count granularity for milestone rewards.
pub const MILESTONE_SIZE: i64 = 5;
/// Bonus credits granted to the referrer at each milestone.
pub const MILESTONE_REWARD: i64 = 5;
/// Bonus credits granted to the referee on redemption.
pub const SIGNUP_BONUS: i64 = 1;
/// Attempts to mint an unclaimed code before giving up.
pub const MAX_CODE_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("referral code not found")]
    CodeNotFound,

    #[error("cannot redeem your own referral code")]
    SelfReferral,

    #[error("a referral code was already redeemed for this account")]
    AlreadyReferred,

    #[error("could not mint a unique referral code after {0} attempts")]
    CodeGenerationExhausted(u32),

    #[error("referral store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// Result of a successful redemption.
#[derive(Debug, Clone, Serialize)]
pub struct RedeemOutcome {
    pub referrer_id: Uuid,
    pub total_referrals: i64,
    pub milestone_reached: bool,
    /// Credits granted to the referrer by this redemption. Zero between
    /// milestones.
    pub credits_earned: i64,
    /// Credits granted to the referee for signing up through a code.
    pub signup_bonus: i64,
}

#[async_trait]
pub trait ReferralLedger: Send + Sync {
    /// Mints and registers the account's referral code. Idempotent: an
    /// account that already holds a code gets the same code back.
    async fn issue_code(&self, user_id: Uuid, email: &str) -> Result<String, ReferralError>;

    /// Redeems `code` on behalf of `referee_id`. At most one redemption per
    /// referee, ever; retries and duplicate submissions never double-grant.
    /// The referee must already hold a referral profile (issued at account
    /// provisioning) for the signup bonus to land.
    async fn redeem(
        &self,
        referee_id: Uuid,
        referee_email: &str,
        code: &str,
    ) -> Result<RedeemOutcome, ReferralError>;

    /// Consumes one bonus credit iff one is available. `Ok(false)` means the
    /// balance was empty and nothing was consumed.
    async fn consume_bonus(&self, user_id: Uuid) -> Result<bool, ReferralError>;

    /// Granted minus used. Accounts without a profile read as zero.
    async fn bonus_remaining(&self, user_id: Uuid) -> Result<i64, ReferralError>;

    async fn profile(&self, user_id: Uuid) -> Result<Option<ReferralProfile>, ReferralError>;

    /// Milestone reward history, oldest first.
    async fn rewards(&self, user_id: Uuid) -> Result<Vec<ReferralReward>, ReferralError>;
}

/// Credits the referrer earns when their running total lands on
/// `total_referrals`.
pub fn milestone_credits(total_referrals: i64) -> i64 {
    if total_referrals > 0 && total_referrals % MILESTONE_SIZE == 0 {
        MILESTONE_REWARD
    } else {
        0
    }
}
