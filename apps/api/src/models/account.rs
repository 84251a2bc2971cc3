use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::entitlement::tier::Tier;

/// A provisioned account. `external_id` is the identity-provider subject;
/// `id` is ours and keys every other table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub external_id: String,
    pub email: String,
    pub tier: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Parsed quota tier. Unrecognized values degrade to Free.
    pub fn tier(&self) -> Tier {
        self.tier.parse().unwrap_or(Tier::Free)
    }
}

/// Input for first-login provisioning.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub external_id: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_account(tier: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            external_id: "auth0|abc123".to_string(),
            email: "dev@example.com".to_string(),
            tier: tier.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_tier_parses_known_values() {
        assert_eq!(make_account("free").tier(), Tier::Free);
        assert_eq!(make_account("premium_299").tier(), Tier::Premium299);
        assert_eq!(make_account("premium_495").tier(), Tier::Premium495);
    }

    #[test]
    fn test_unknown_tier_degrades_to_free() {
        assert_eq!(make_account("enterprise").tier(), Tier::Free);
        assert_eq!(make_account("").tier(), Tier::Free);
    }
}
