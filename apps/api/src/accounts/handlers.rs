use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::tier::Tier;
use crate::errors::AppError;
use crate::models::account::{Account, NewAccount};
use crate::referral::{RedeemOutcome, ReferralError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitAccountRequest {
    pub external_id: String,
    pub email: String,
    /// Referral code carried over from the invite link, if any.
    pub referral_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitAccountResponse {
    pub account: Account,
    pub referral_code: String,
    pub redeemed: Option<RedeemOutcome>,
}

/// POST /api/v1/accounts/init
///
/// First-login provisioning: account row, zeroed usage counters, referral
/// code. Safe to call on every login; nothing is ever reset. A supplied
/// invite code is redeemed after the account exists, so a redemption
/// failure leaves the account and its code in place for the retry.
pub async fn handle_init_account(
    State(state): State<AppState>,
    Json(req): Json<InitAccountRequest>,
) -> Result<Json<InitAccountResponse>, AppError> {
    if req.external_id.trim().is_empty() || req.email.trim().is_empty() {
        return Err(AppError::Validation(
            "external_id and email are required".to_string(),
        ));
    }

    let account = state
        .accounts
        .provision(NewAccount {
            external_id: req.external_id,
            email: req.email,
        })
        .await?;
    state.usage.initialize(account.id).await?;
    let referral_code = state
        .referrals
        .issue_code(account.id, &account.email)
        .await?;

    let redeemed = match req.referral_code {
        Some(code) => match state.referrals.redeem(account.id, &account.email, &code).await {
            Ok(outcome) => Some(outcome),
            // Re-login through the same invite link; already processed.
            Err(ReferralError::AlreadyReferred) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    Ok(Json(InitAccountResponse {
        account,
        referral_code,
        redeemed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetTierRequest {
    pub user_id: Uuid,
    pub tier: Tier,
}

/// POST /api/v1/accounts/tier
///
/// Applied after the payment provider confirms a checkout. Signature
/// verification happens upstream of this service.
pub async fn handle_set_tier(
    State(state): State<AppState>,
    Json(req): Json<SetTierRequest>,
) -> Result<Json<Account>, AppError> {
    let account = state
        .accounts
        .set_tier(req.user_id, req.tier)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", req.user_id)))?;
    Ok(Json(account))
}
