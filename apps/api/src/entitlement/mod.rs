//! Entitlement — tiers, the quota policy, and the evaluate/commit service.

pub mod handlers;
pub mod policy;
pub mod service;
pub mod tier;
