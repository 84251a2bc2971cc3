pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::accounts::handlers as accounts;
use crate::entitlement::handlers as entitlement;
use crate::optimize::handlers as optimize;
use crate::referral::handlers as referral;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Accounts
        .route("/api/v1/accounts/init", post(accounts::handle_init_account))
        .route("/api/v1/accounts/tier", post(accounts::handle_set_tier))
        // Entitlements
        .route(
            "/api/v1/entitlements",
            get(entitlement::handle_get_entitlements),
        )
        .route("/api/v1/tiers", get(entitlement::handle_list_tiers))
        // Optimization
        .route("/api/v1/optimize", post(optimize::handle_optimize))
        // Referrals
        .route("/api/v1/referrals", get(referral::handle_get_referrals))
        .route("/api/v1/referrals/redeem", post(referral::handle_redeem))
        .with_state(state)
}
