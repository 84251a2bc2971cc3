//! Resume optimization — the request pipeline around the entitlement core.
//!
//! Flow:
//!   1. Validate input sizes (cheap rejects before any quota or LLM work)
//!   2. Quota pre-check with a projected token estimate
//!   3. LLM rewrite (hard 30s deadline inside the client)
//!   4. Commit the actual spend
//!
//! Evaluate and commit deliberately do not span the LLM call: a timeout or
//! API failure leaves the user's quota untouched.

pub mod handlers;
pub mod prompts;
pub mod rate_limit;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::entitlement::policy::DenialReason;
use crate::entitlement::service::{CommitOutcome, EntitlementService};
use crate::errors::AppError;
use crate::llm_client::{LlmClient, MAX_TOKENS};
use crate::optimize::prompts::{build_optimize_prompt, OPTIMIZE_SYSTEM};

/// Inputs past these sizes are rejected before anything is spent.
const MAX_RESUME_BYTES: usize = 50 * 1024;
const MAX_JOB_DESC_BYTES: usize = 20 * 1024;
/// Anything shorter than this cannot be a real resume or job description.
const MIN_INPUT_CHARS: usize = 50;

/// Rough prompt-side chars-per-token divisor for the pre-check estimate.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeRequest {
    pub user_id: Option<Uuid>,
    pub resume_text: String,
    pub job_description: String,
}

/// The rewritten resume as structured content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedResume {
    pub contact: Contact,
    pub professional_summary: String,
    #[serde(default)]
    pub experience: Vec<ExperienceItem>,
    #[serde(default)]
    pub education: Vec<EducationItem>,
    #[serde(default)]
    pub certifications: Vec<CertificationItem>,
    #[serde(default)]
    pub skills: Vec<SkillGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceItem {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationItem {
    pub degree: String,
    pub institution: String,
    pub location: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationItem {
    pub name: String,
    pub issuer: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGroup {
    pub category: String,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub resume: OptimizedResume,
    pub tokens_used: i64,
    pub usage: CommitOutcome,
}

/// Validates request sizes. First failure wins.
fn validate(req: &OptimizeRequest) -> Result<(), AppError> {
    if req.resume_text.trim().is_empty() {
        return Err(AppError::Validation("Resume text is required".to_string()));
    }
    if req.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "Job description is required".to_string(),
        ));
    }
    if req.resume_text.len() > MAX_RESUME_BYTES {
        return Err(AppError::Validation(format!(
            "Resume exceeds maximum size of {}KB",
            MAX_RESUME_BYTES / 1024
        )));
    }
    if req.job_description.len() > MAX_JOB_DESC_BYTES {
        return Err(AppError::Validation(format!(
            "Job description exceeds maximum size of {}KB",
            MAX_JOB_DESC_BYTES / 1024
        )));
    }
    if req.resume_text.trim().len() < MIN_INPUT_CHARS {
        return Err(AppError::Validation("Resume text is too short".to_string()));
    }
    if req.job_description.trim().len() < MIN_INPUT_CHARS {
        return Err(AppError::Validation(
            "Job description is too short".to_string(),
        ));
    }
    Ok(())
}

/// Projected spend for the quota pre-check: prompt characters at roughly
/// four per token, plus the full completion budget.
pub fn estimate_tokens(resume: &str, job_description: &str) -> i64 {
    ((resume.len() + job_description.len()) / CHARS_PER_TOKEN) as i64 + i64::from(MAX_TOKENS)
}

/// Runs the whole pipeline for one request.
pub async fn run_optimization(
    entitlements: &EntitlementService,
    llm: &LlmClient,
    req: OptimizeRequest,
) -> Result<OptimizeResponse, AppError> {
    validate(&req)?;
    let user_id = req.user_id.ok_or(AppError::NotAuthenticated)?;

    let estimated = estimate_tokens(&req.resume_text, &req.job_description);
    let snapshot = entitlements.evaluate(Some(user_id), estimated).await?;
    if !snapshot.can_optimize {
        let message = snapshot.message.unwrap_or_default();
        return Err(match snapshot.denial {
            Some(DenialReason::TokenExhausted) => AppError::TokenExhausted(message),
            _ => AppError::TierExhausted(message),
        });
    }

    info!("Optimizing resume for user {user_id} (estimated {estimated} tokens)");
    let prompt = build_optimize_prompt(&req.resume_text, &req.job_description);
    let response = llm.call(&prompt, OPTIMIZE_SYSTEM).await?;
    let resume: OptimizedResume = response.parse_json()?;
    let tokens_used = response.total_tokens();

    // A commit failure surfaces as an error; the rewrite is not reported as
    // saved usage.
    let usage = entitlements.commit(user_id, tokens_used).await?;

    Ok(OptimizeResponse {
        resume,
        tokens_used,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(resume_len: usize, jd_len: usize) -> OptimizeRequest {
        OptimizeRequest {
            user_id: Some(Uuid::new_v4()),
            resume_text: "r".repeat(resume_len),
            job_description: "j".repeat(jd_len),
        }
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let mut req = make_request(500, 500);
        req.resume_text = "   ".to_string();
        let err = validate(&req).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "Resume text is required"));
    }

    #[test]
    fn test_short_input_is_rejected() {
        let err = validate(&make_request(20, 500)).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "Resume text is too short"));

        let err = validate(&make_request(500, 20)).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "Job description is too short"));
    }

    #[test]
    fn test_oversized_input_is_rejected() {
        let err = validate(&make_request(MAX_RESUME_BYTES + 1, 500)).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.contains("50KB")));

        let err = validate(&make_request(500, MAX_JOB_DESC_BYTES + 1)).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.contains("20KB")));
    }

    #[test]
    fn test_reasonable_input_passes() {
        assert!(validate(&make_request(2_000, 1_000)).is_ok());
    }

    #[test]
    fn test_estimate_includes_the_completion_budget() {
        // 4000 prompt chars -> 1000 prompt tokens, plus the 8000 headroom.
        let estimate = estimate_tokens(&"r".repeat(3_000), &"j".repeat(1_000));
        assert_eq!(estimate, 1_000 + i64::from(MAX_TOKENS));
    }
}
