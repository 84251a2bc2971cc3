// All LLM prompt constants for the optimization pipeline.

/// System prompt for the rewrite — enforces the no-fabrication contract and
/// JSON-only output.
pub const OPTIMIZE_SYSTEM: &str =
    "You are an expert resume writer and career strategist. \
    You reword existing resumes to fit a target job description. \
    You never invent experience, skills, or credentials. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Rewrite prompt template. Replace `{resume}` and `{job_description}`
/// before sending.
pub const OPTIMIZE_PROMPT_TEMPLATE: &str = r#"Analyze the job description and strategically reword the candidate's EXISTING resume to make them the best possible fit for this specific role.

CRITICAL RULES - NEVER VIOLATE:
1. DO NOT invent, fabricate, or add ANY job titles, companies, experiences, or accomplishments that are not in the original resume
2. DO NOT add skills or technologies the candidate has not mentioned
3. ONLY reword and rephrase EXISTING content to:
   - Emphasize skills and keywords from the job description
   - Highlight relevant accomplishments that match the job requirements
   - Use terminology and language from the job posting
   - Reorder bullet points to put the most relevant experience first
4. Keep ALL job titles, company names, dates, and education EXACTLY as written in the original
5. Maintain the candidate's authentic voice and real experience

Resume (THIS IS THE ONLY SOURCE OF TRUTH - preserve all actual experiences):
{resume}

Job Description (analyze for keywords and requirements):
{job_description}

Return a JSON object with this EXACT schema (no extra fields):
{
  "contact": {
    "name": "...",
    "email": "...",
    "phone": "...",
    "linkedin": "...",
    "address": "..."
  },
  "professional_summary": "2-3 sentence summary optimized for this role",
  "experience": [
    {
      "title": "...",
      "company": "...",
      "location": "...",
      "start_date": "MMM YYYY",
      "end_date": "MMM YYYY or Present",
      "bullets": ["..."]
    }
  ],
  "education": [
    {
      "degree": "...",
      "institution": "...",
      "location": "...",
      "date": "..."
    }
  ],
  "certifications": [
    {
      "name": "...",
      "issuer": "...",
      "date": "..."
    }
  ],
  "skills": [
    {
      "category": "...",
      "items": ["..."]
    }
  ]
}

Omit optional contact fields the resume does not provide by setting them to null. Use empty arrays for sections the resume does not have."#;

/// Builds the rewrite prompt for one request.
pub fn build_optimize_prompt(resume: &str, job_description: &str) -> String {
    OPTIMIZE_PROMPT_TEMPLATE
        .replace("{resume}", resume)
        .replace("{job_description}", job_description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_placeholders_are_substituted() {
        let prompt = build_optimize_prompt("MY RESUME BODY", "TARGET JD BODY");
        assert!(prompt.contains("MY RESUME BODY"));
        assert!(prompt.contains("TARGET JD BODY"));
        assert!(!prompt.contains("{resume}"));
        assert!(!prompt.contains("{job_description}"));
    }
}
