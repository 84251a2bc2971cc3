#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::accounts::AccountError;
use crate::entitlement::service::EntitlementError;
use crate::llm_client::LlmError;
use crate::referral::ReferralError;
use crate::usage::UsageError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Rate limited")]
    RateLimited,

    #[error("Tier allowance exhausted: {0}")]
    TierExhausted(String),

    #[error("Token budget exhausted: {0}")]
    TokenExhausted(String),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Referral error: {0}")]
    Referral(#[from] ReferralError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<EntitlementError> for AppError {
    fn from(e: EntitlementError) -> Self {
        match e {
            EntitlementError::AccountNotFound(id) => {
                AppError::NotFound(format!("Account {id} not found"))
            }
            EntitlementError::Account(e) => AppError::Account(e),
            EntitlementError::Usage(e) => AppError::Usage(e),
            EntitlementError::Referral(e) => AppError::Referral(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                "NOT_AUTHENTICATED",
                "Please log in to optimize your resume.".to_string(),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests. Please try again later.".to_string(),
            ),
            AppError::TierExhausted(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "TIER_EXHAUSTED", msg.clone())
            }
            AppError::TokenExhausted(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "TOKEN_EXHAUSTED", msg.clone())
            }
            AppError::Referral(ReferralError::CodeNotFound) => (
                StatusCode::NOT_FOUND,
                "CODE_NOT_FOUND",
                "Invalid referral code".to_string(),
            ),
            AppError::Referral(ReferralError::SelfReferral) => (
                StatusCode::BAD_REQUEST,
                "SELF_REFERRAL",
                "Cannot refer yourself".to_string(),
            ),
            AppError::Referral(ReferralError::AlreadyReferred) => (
                StatusCode::CONFLICT,
                "ALREADY_REFERRED",
                "User already referred".to_string(),
            ),
            AppError::Referral(ReferralError::CodeGenerationExhausted(attempts)) => {
                tracing::error!("Referral code generation gave up after {attempts} attempts");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CODE_GENERATION_EXHAUSTED",
                    "Could not issue a referral code. Please try again.".to_string(),
                )
            }
            AppError::Referral(ReferralError::Unavailable(e)) => {
                tracing::error!("Referral store unavailable: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_UNAVAILABLE",
                    "Referral data is temporarily unavailable".to_string(),
                )
            }
            AppError::Usage(UsageError::Conflict { .. }) => {
                tracing::error!("Usage commit conflict: {self}");
                (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    "Could not record the optimization. Please try again.".to_string(),
                )
            }
            AppError::Usage(UsageError::Unavailable(e)) => {
                tracing::error!("Usage store unavailable: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_UNAVAILABLE",
                    "Usage data is temporarily unavailable".to_string(),
                )
            }
            AppError::Account(AccountError::Unavailable(e)) => {
                tracing::error!("Account store unavailable: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_UNAVAILABLE",
                    "Account data is temporarily unavailable".to_string(),
                )
            }
            AppError::Llm(LlmError::Timeout { .. }) => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "Request timeout. Please try again.".to_string(),
            ),
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_denials_map_to_payment_required() {
        let tier = AppError::TierExhausted("out of optimizations".to_string()).into_response();
        assert_eq!(tier.status(), StatusCode::PAYMENT_REQUIRED);

        let tokens = AppError::TokenExhausted("out of tokens".to_string()).into_response();
        assert_eq!(tokens.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_referral_errors_keep_their_distinct_statuses() {
        assert_eq!(
            AppError::Referral(ReferralError::CodeNotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Referral(ReferralError::SelfReferral)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Referral(ReferralError::AlreadyReferred)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_llm_timeout_maps_to_gateway_timeout() {
        let err = AppError::Llm(LlmError::Timeout { seconds: 30 });
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
