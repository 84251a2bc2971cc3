use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quota ceilings for one tier. The token ceiling is absolute: nothing,
/// including referral bonus credits, extends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    pub max_optimizations: i64,
    pub max_tokens: i64,
}

/// Quota tier. Paid tiers are named after their USD price points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "premium_299")]
    Premium299,
    #[serde(rename = "premium_495")]
    Premium495,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Premium299, Tier::Premium495];

    /// Static limits table. Edits here apply to future quota checks only;
    /// usage already committed is never re-evaluated.
    pub const fn limits(&self) -> TierLimits {
        match self {
            Tier::Free => TierLimits {
                max_optimizations: 1,
                max_tokens: 20_000,
            },
            Tier::Premium299 => TierLimits {
                max_optimizations: 10,
                max_tokens: 400_000,
            },
            Tier::Premium495 => TierLimits {
                max_optimizations: 20,
                max_tokens: 1_000_000,
            },
        }
    }

    /// Checkout price in cents; `None` for the free tier.
    pub const fn price_cents(&self) -> Option<u32> {
        match self {
            Tier::Free => None,
            Tier::Premium299 => Some(299),
            Tier::Premium495 => Some(495),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium299 => "premium_299",
            Tier::Premium495 => "premium_495",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown tier: {0}")]
pub struct TierParseError(String);

impl FromStr for Tier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "premium_299" => Ok(Tier::Premium299),
            "premium_495" => Ok(Tier::Premium495),
            other => Err(TierParseError(other.to_string())),
        }
    }
}
