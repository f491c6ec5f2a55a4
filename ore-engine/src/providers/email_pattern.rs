//! Email pattern guessing
//!
//! Builds ranked corporate email guesses from a person's name and a company
//! domain. No network access: guesses carry pattern-prior confidence only and
//! are marked unverified.

use super::{Confidence, ContactCandidate};

pub const PROVIDER_NAME: &str = "email_pattern";

/// Pattern label, confidence prior
const PATTERNS: &[(&str, Confidence)] = &[
    ("first.last", 95),
    ("firstlast", 90),
    ("flast", 85),
    ("first_last", 80),
    ("first-last", 75),
    ("last.first", 70),
    ("f.last", 65),
    ("first", 60),
    ("firstl", 55),
    ("fl", 50),
];

/// Ranked email guesses for a person at a domain
#[derive(Debug, Clone, Default)]
pub struct EmailPatternProvider;

impl EmailPatternProvider {
    pub fn new() -> Self {
        Self
    }

    /// Guesses ordered by descending confidence, deduplicated
    ///
    /// Empty when no first name or usable domain can be extracted.
    pub fn generate(&self, full_name: &str, domain: &str) -> Vec<ContactCandidate> {
        let (first, last) = split_name(full_name);
        let domain = clean_domain(domain);
        if first.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Vec::new();
        }

        if last.is_empty() {
            return vec![ContactCandidate::email(
                format!("{}@{}", first, domain),
                PROVIDER_NAME,
                60,
            )
            .unverified()];
        }

        let f = &first[..first.chars().next().map_or(0, char::len_utf8)];
        let l = &last[..last.chars().next().map_or(0, char::len_utf8)];

        let mut seen = std::collections::HashSet::new();
        PATTERNS
            .iter()
            .map(|(pattern, confidence)| {
                let local = match *pattern {
                    "first.last" => format!("{}.{}", first, last),
                    "firstlast" => format!("{}{}", first, last),
                    "flast" => format!("{}{}", f, last),
                    "first_last" => format!("{}_{}", first, last),
                    "first-last" => format!("{}-{}", first, last),
                    "last.first" => format!("{}.{}", last, first),
                    "f.last" => format!("{}.{}", f, last),
                    "first" => first.clone(),
                    "firstl" => format!("{}{}", first, l),
                    _ => format!("{}{}", f, l),
                };
                (format!("{}@{}", local, domain), *confidence)
            })
            .filter(|(email, _)| seen.insert(email.clone()))
            .map(|(email, confidence)| ContactCandidate::email(email, PROVIDER_NAME, confidence).unverified())
            .collect()
    }
}

/// Lowercased first and last name with punctuation dropped
fn split_name(full_name: &str) -> (String, String) {
    let cleaned: String = full_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect();
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [only] => (only.to_string(), String::new()),
        [first, .., last] => (first.to_string(), last.to_string()),
    }
}

/// Bare host from a domain or URL ("https://www.acme.com/about" → "acme.com")
fn clean_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    let without_scheme = lower.split("//").last().unwrap_or_default();
    let host = without_scheme.split('/').next().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_ranked() {
        let guesses = EmailPatternProvider::new().generate("John A. Smith", "https://www.acme.com/team");
        assert_eq!(guesses[0].value, "john.smith@acme.com");
        assert_eq!(guesses[0].confidence, 95);
        assert_eq!(guesses[2].value, "jsmith@acme.com");
        assert_eq!(guesses.last().map(|g| g.value.as_str()), Some("js@acme.com"));
        assert!(guesses.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert!(guesses.iter().all(ContactCandidate::is_unverified_guess));
    }

    #[test]
    fn test_single_name_and_bad_domain() {
        let provider = EmailPatternProvider::new();
        let guesses = provider.generate("Cher", "cher.com");
        assert_eq!(guesses.len(), 1);
        assert_eq!(guesses[0].value, "cher@cher.com");
        assert!(provider.generate("John Smith", "").is_empty());
        assert!(provider.generate("", "acme.com").is_empty());
    }
}
