use std::sync::Arc;

use crate::accounts::AccountStore;
use crate::config::Config;
use crate::entitlement::service::EntitlementService;
use crate::llm_client::LlmClient;
use crate::optimize::rate_limit::RateLimiter;
use crate::referral::ReferralLedger;
use crate::usage::UsageStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    pub config: Config,
    /// Account provisioning and tier transitions.
    pub accounts: Arc<dyn AccountStore>,
    /// Usage counters. Backend selected at startup via STORAGE_BACKEND.
    pub usage: Arc<dyn UsageStore>,
    /// Referral codes, redemptions, and bonus credits. Same backend family
    /// as `usage`.
    pub referrals: Arc<dyn ReferralLedger>,
    /// Quota decisions over the three stores above.
    pub entitlements: EntitlementService,
    pub rate_limiter: Arc<RateLimiter>,
}
