use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::referral::ReferralReward;
use crate::referral::{RedeemOutcome, MILESTONE_SIZE};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReferralsQuery {
    pub user_id: Uuid,
}

/// Dashboard view of one account's referral standing.
#[derive(Debug, Serialize)]
pub struct ReferralSummary {
    pub code: String,
    pub total_referrals: i64,
    pub bonus_credits_granted: i64,
    pub bonus_credits_used: i64,
    pub bonus_remaining: i64,
    /// Referrals made since the last milestone.
    pub progress_to_next_reward: i64,
    /// Referral count at which the next reward lands.
    pub next_milestone: i64,
    pub redeemed_code: Option<String>,
    pub rewards: Vec<ReferralReward>,
}

/// GET /api/v1/referrals
pub async fn handle_get_referrals(
    State(state): State<AppState>,
    Query(params): Query<ReferralsQuery>,
) -> Result<Json<ReferralSummary>, AppError> {
    let profile = state
        .referrals
        .profile(params.user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No referral profile for user {}", params.user_id))
        })?;
    let rewards = state.referrals.rewards(params.user_id).await?;

    Ok(Json(ReferralSummary {
        bonus_remaining: profile.bonus_remaining(),
        progress_to_next_reward: profile.total_referrals % MILESTONE_SIZE,
        next_milestone: (profile.total_referrals / MILESTONE_SIZE + 1) * MILESTONE_SIZE,
        code: profile.code,
        total_referrals: profile.total_referrals,
        bonus_credits_granted: profile.bonus_credits_granted,
        bonus_credits_used: profile.bonus_credits_used,
        redeemed_code: profile.redeemed_code,
        rewards,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub user_id: Uuid,
    pub code: String,
}

/// POST /api/v1/referrals/redeem
pub async fn handle_redeem(
    State(state): State<AppState>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemOutcome>, AppError> {
    // Resolve the account before touching the ledger: an unknown user is a
    // 404 here, not a foreign-key failure inside issue_code.
    let account = state
        .accounts
        .find(req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", req.user_id)))?;

    // The referee needs a profile to hold the signup bonus.
    state
        .referrals
        .issue_code(account.id, &account.email)
        .await?;
    let outcome = state
        .referrals
        .redeem(account.id, &account.email, &req.code)
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::accounts::{AccountStore, MemoryAccountStore};
    use crate::config::{Config, StorageBackend};
    use crate::entitlement::service::EntitlementService;
    use crate::llm_client::LlmClient;
    use crate::models::account::NewAccount;
    use crate::optimize::rate_limit::RateLimiter;
    use crate::referral::{MemoryReferralLedger, ReferralLedger};
    use crate::usage::{MemoryUsageStore, UsageStore};

    fn make_state() -> AppState {
        let accounts: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
        let usage: Arc<dyn UsageStore> = Arc::new(MemoryUsageStore::new());
        let referrals: Arc<dyn ReferralLedger> = Arc::new(MemoryReferralLedger::new());
        let entitlements = EntitlementService::new(
            Arc::clone(&accounts),
            Arc::clone(&usage),
            Arc::clone(&referrals),
        );
        AppState {
            llm: LlmClient::new("test-key".to_string()),
            config: Config {
                storage_backend: StorageBackend::Memory,
                database_url: None,
                anthropic_api_key: "test-key".to_string(),
                port: 8080,
                rust_log: "info".to_string(),
            },
            accounts,
            usage,
            referrals,
            entitlements,
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }

    async fn provision(state: &AppState, email: &str) -> Uuid {
        let account = state
            .accounts
            .provision(NewAccount {
                external_id: format!("auth0|{email}"),
                email: email.to_string(),
            })
            .await
            .unwrap();
        state.usage.initialize(account.id).await.unwrap();
        state
            .referrals
            .issue_code(account.id, email)
            .await
            .unwrap();
        account.id
    }

    async fn code_of(state: &AppState, user_id: Uuid) -> String {
        state
            .referrals
            .profile(user_id)
            .await
            .unwrap()
            .unwrap()
            .code
    }

    #[tokio::test]
    async fn test_redeem_for_an_unknown_account_is_not_found() {
        let state = make_state();
        let referrer = provision(&state, "owner@example.com").await;
        let code = code_of(&state, referrer).await;

        // A valid code cannot be redeemed by an account that does not exist.
        let err = handle_redeem(
            State(state),
            Json(RedeemRequest {
                user_id: Uuid::new_v4(),
                code,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_redeem_through_the_handler_grants_the_signup_bonus() {
        let state = make_state();
        let referrer = provision(&state, "owner@example.com").await;
        let code = code_of(&state, referrer).await;
        let referee = provision(&state, "friend@example.com").await;

        let Json(outcome) = handle_redeem(
            State(state.clone()),
            Json(RedeemRequest {
                user_id: referee,
                code: code.clone(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(outcome.referrer_id, referrer);
        assert_eq!(outcome.total_referrals, 1);
        assert_eq!(outcome.signup_bonus, 1);

        let profile = state.referrals.profile(referee).await.unwrap().unwrap();
        assert_eq!(profile.bonus_credits_granted, 1);
        assert_eq!(profile.redeemed_code.as_deref(), Some(code.as_str()));
    }
}
