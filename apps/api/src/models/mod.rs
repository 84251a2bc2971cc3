pub mod account;
pub mod referral;
pub mod usage;
