use rand::distributions::Alphanumeric;
use rand::Rng;

/// Characters taken from the email local part.
const PREFIX_LEN: usize = 4;
/// Random characters appended after the prefix.
const SUFFIX_LEN: usize = 4;
/// Used when the local part has no alphanumeric characters at all.
const FALLBACK_PREFIX: &str = "USER";

/// Mints a candidate referral code: up to four alphanumeric characters of
/// the email local part, uppercased, plus a random alphanumeric tail.
/// Candidates can collide; the caller owns registry checks and retries.
pub fn candidate_code(email: &str) -> String {
    let prefix: String = email
        .chars()
        .take_while(|c| *c != '@')
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(PREFIX_LEN)
        .collect();
    let prefix = if prefix.is_empty() {
        FALLBACK_PREFIX.to_string()
    } else {
        prefix
    };

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();

    format!("{prefix}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_comes_from_the_email_local_part() {
        let code = candidate_code("jasmine@example.com");
        assert!(code.starts_with("JASM"), "got {code}");
        assert_eq!(code.len(), PREFIX_LEN + SUFFIX_LEN);
    }

    #[test]
    fn test_short_local_parts_shorten_the_prefix() {
        let code = candidate_code("al@example.com");
        assert!(code.starts_with("AL"), "got {code}");
        assert_eq!(code.len(), 2 + SUFFIX_LEN);
    }

    #[test]
    fn test_non_alphanumeric_characters_are_skipped() {
        let code = candidate_code("j.o-h_n@example.com");
        assert!(code.starts_with("JOHN"), "got {code}");
    }

    #[test]
    fn test_empty_local_part_falls_back() {
        assert!(candidate_code("@example.com").starts_with(FALLBACK_PREFIX));
        assert!(candidate_code("...@example.com").starts_with(FALLBACK_PREFIX));
        assert!(candidate_code("").starts_with(FALLBACK_PREFIX));
    }

    #[test]
    fn test_codes_are_uppercase_alphanumeric() {
        let code = candidate_code("dev@example.com");
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_suffixes_differ_across_calls() {
        // 36^4 suffixes make a collision here vanishingly unlikely.
        let a = candidate_code("same@example.com");
        let b = candidate_code("same@example.com");
        assert!(a != b || candidate_code("same@example.com") != a);
    }
}
