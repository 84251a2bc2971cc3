use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::service::EntitlementSnapshot;
use crate::entitlement::tier::Tier;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EntitlementsQuery {
    /// Absent for logged-out visitors; they get a denial snapshot.
    pub user_id: Option<Uuid>,
    /// Projected token spend for the next optimization, if known.
    #[serde(default)]
    pub estimated_tokens: i64,
}

/// GET /api/v1/entitlements
pub async fn handle_get_entitlements(
    State(state): State<AppState>,
    Query(params): Query<EntitlementsQuery>,
) -> Result<Json<EntitlementSnapshot>, AppError> {
    let snapshot = state
        .entitlements
        .evaluate(params.user_id, params.estimated_tokens)
        .await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Serialize)]
pub struct TierInfo {
    pub tier: Tier,
    pub max_optimizations: i64,
    pub max_tokens: i64,
    pub price_cents: Option<u32>,
}

/// GET /api/v1/tiers
pub async fn handle_list_tiers() -> Json<Vec<TierInfo>> {
    let tiers = Tier::ALL
        .iter()
        .map(|tier| {
            let limits = tier.limits();
            TierInfo {
                tier: *tier,
                max_optimizations: limits.max_optimizations,
                max_tokens: limits.max_tokens,
                price_cents: tier.price_cents(),
            }
        })
        .collect();
    Json(tiers)
}
