//! The quota decision itself: a pure function over counters and limits.
//!
//! No I/O and no clock, so every branch is unit-testable. Rule order is
//! load-bearing: the token ceiling is checked before anything else and no
//! later rule can override it.

use serde::Serialize;

use crate::entitlement::tier::TierLimits;
use crate::models::usage::Usage;

/// Why an optimization was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Tier optimization allowance spent and no bonus credits remain.
    TierExhausted,
    /// Projected token spend would cross the tier's token ceiling.
    TokenExhausted,
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { using_bonus: bool },
    Denied { reason: DenialReason },
}

/// Decides whether one more optimization fits.
///
/// Rules, in order:
/// 1. `total_tokens_consumed + estimated_tokens` over `max_tokens` denies
///    with `TokenExhausted`. Bonus credits never bypass this. The sum
///    saturates, so an estimate near `i64::MAX` denies instead of wrapping.
/// 2. `optimization_count` under `max_optimizations` allows on the tier.
/// 3. A positive bonus balance allows, funded by a bonus credit.
/// 4. Otherwise `TierExhausted`.
pub fn can_optimize(
    usage: &Usage,
    limits: &TierLimits,
    bonus_remaining: i64,
    estimated_tokens: i64,
) -> Decision {
    if usage.total_tokens_consumed.saturating_add(estimated_tokens) > limits.max_tokens {
        return Decision::Denied {
            reason: DenialReason::TokenExhausted,
        };
    }
    if usage.optimization_count < limits.max_optimizations {
        return Decision::Allowed { using_bonus: false };
    }
    if bonus_remaining > 0 {
        return Decision::Allowed { using_bonus: true };
    }
    Decision::Denied {
        reason: DenialReason::TierExhausted,
    }
}
