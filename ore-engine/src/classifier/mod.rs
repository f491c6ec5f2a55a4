//! Name classification and officer-name validation
//!
//! Raw owner and officer strings arrive from county assessors and corporate
//! registries in inconsistent shapes ("SMITH, JOHN A", "L.L.C.", "POSITIONS
//! INCLUDE MANAGER"). These helpers decide whether a string names a human or an
//! entity, and whether an officer entry is usable at all.
//!
//! Every function here is total: no I/O, no errors, no panics.

mod lexicon;

use lexicon::{
    BUSINESS_WORDS, CONJUNCTIONS, DESCRIPTION_STARTERS, ENTITY_KEYWORDS, ENTITY_SUFFIXES,
    FIRST_NAMES, FRANCHISE_BRANDS, GENERATIONAL_SUFFIXES, PLACEHOLDER_PHRASES,
    PLACEHOLDER_VALUES, PRIVACY_AGENTS,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Officer names longer than this are descriptions, not names
const MAX_OFFICER_NAME_LEN: usize = 120;

/// Classification of a name string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameKind {
    Person,
    Entity,
}

impl NameKind {
    /// Owner type label stored on owner rows
    pub fn owner_type(&self) -> &'static str {
        match self {
            NameKind::Person => "individual",
            NameKind::Entity => "entity",
        }
    }
}

/// Normalize a raw name for comparison
///
/// Uppercases, drops dots, turns stray punctuation into spaces, collapses runs of
/// single-letter tokens ("L L C" → "LLC") and collapses whitespace. The characters
/// `& ' - , /` survive because they carry meaning in names.
pub fn normalize_name(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '.' => {}
            c if c.is_alphanumeric() => cleaned.extend(c.to_uppercase()),
            '&' | '\'' | '-' | '/' => cleaned.push(ch),
            ',' => cleaned.push_str(", "),
            _ => cleaned.push(' '),
        }
    }

    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if is_single_letter(tokens[i]) {
            let mut j = i;
            while j < tokens.len() && is_single_letter(tokens[j]) {
                j += 1;
            }
            if j - i >= 2 {
                out.push(tokens[i..j].concat());
            } else {
                out.push(tokens[i].to_string());
            }
            i = j;
        } else {
            out.push(tokens[i].to_string());
            i += 1;
        }
    }

    out.join(" ").replace(" ,", ",")
}

fn is_single_letter(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

/// Tokens of a normalized name with commas removed
fn tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

/// Classify a raw name as a person or an entity
///
/// Ambiguous names classify as [`NameKind::Entity`].
pub fn classify(raw: &str) -> NameKind {
    let normalized = normalize_name(raw);
    let all_tokens = tokens(&normalized);

    if all_tokens.is_empty() {
        return NameKind::Entity;
    }

    if all_tokens.iter().any(|t| ENTITY_KEYWORDS.contains(t)) {
        return NameKind::Entity;
    }

    if looks_like_person(&person_tokens(&normalized)) {
        NameKind::Person
    } else {
        NameKind::Entity
    }
}

/// Convenience wrapper for `classify(name) == Person`
pub fn is_person(raw: &str) -> bool {
    classify(raw) == NameKind::Person
}

/// Person-test tokens: "LAST, FIRST M" reordered, generational suffixes dropped
fn person_tokens(normalized: &str) -> Vec<String> {
    let ordered: Vec<&str> = match normalized.split_once(',') {
        Some((last, rest)) if !rest.contains(',') && !last.trim().is_empty() => {
            let mut v = tokens(rest);
            v.extend(tokens(last));
            v
        }
        _ => tokens(normalized),
    };

    ordered
        .into_iter()
        .filter(|t| !GENERATIONAL_SUFFIXES.contains(t))
        .map(str::to_string)
        .collect()
}

fn looks_like_person(tokens: &[String]) -> bool {
    if !(2..=4).contains(&tokens.len()) {
        return false;
    }
    if tokens.iter().any(|t| !t.chars().any(char::is_alphabetic)) {
        return false;
    }

    let first = tokens[0].as_str();
    let last = tokens[tokens.len() - 1].as_str();
    let known_first = FIRST_NAMES.contains(first);
    let has_initial = tokens[1..tokens.len() - 1]
        .iter()
        .any(|t| is_single_letter(t));

    (known_first || has_initial) && !BUSINESS_WORDS.contains(last) && !is_single_letter(last)
}

/// Check whether an officer entry names something usable
///
/// Rejects placeholder text, descriptions and parsing fragments. Rejections are
/// logged at debug level.
pub fn is_valid_officer_name(raw: &str) -> bool {
    let trimmed = raw.trim();
    let reject = |reason: &str| {
        debug!(name = trimmed, reason, "Rejected officer name");
        false
    };

    if trimmed.chars().count() < 2 {
        return reject("too short");
    }
    if !trimmed.chars().any(char::is_alphabetic) {
        return reject("no letters");
    }
    if trimmed.chars().count() > MAX_OFFICER_NAME_LEN {
        return reject("too long");
    }

    let upper = trimmed.to_uppercase();
    let collapsed = upper.split_whitespace().collect::<Vec<_>>().join(" ");

    if PLACEHOLDER_VALUES.contains(&collapsed.as_str()) {
        return reject("placeholder value");
    }
    if let Some(phrase) = PLACEHOLDER_PHRASES.iter().find(|p| collapsed.contains(*p)) {
        debug!(name = trimmed, phrase, "Rejected officer name");
        return false;
    }

    let words: Vec<&str> = collapsed.split(' ').collect();
    if words.len() > 1 && DESCRIPTION_STARTERS.contains(&words[0]) {
        return reject("description starter");
    }
    let first = words.first().copied().unwrap_or_default();
    let last = words.last().copied().unwrap_or_default();
    if CONJUNCTIONS.contains(&first) || CONJUNCTIONS.contains(&last) {
        return reject("dangling conjunction");
    }

    true
}

/// Check whether an officer name is a registered-agent or compliance service
pub fn is_privacy_protected_officer(raw: &str) -> bool {
    let normalized = normalize_name(raw);
    let name_tokens = tokens(&normalized);
    if name_tokens.is_empty() {
        return false;
    }

    PRIVACY_AGENTS.iter().any(|agent| {
        let agent_tokens: Vec<&str> = agent.split(' ').collect();
        contains_sequence(&name_tokens, &agent_tokens)
    })
}

fn contains_sequence(haystack: &[&str], needle: &[&str]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}

/// True iff the list is non-empty and no officer is a usable human principal
///
/// An officer counts as masking when it is a privacy agent or fails the person test.
pub fn has_only_privacy_protected_officers<S: AsRef<str>>(officers: &[S]) -> bool {
    !officers.is_empty()
        && officers
            .iter()
            .all(|o| is_privacy_protected_officer(o.as_ref()) || !is_person(o.as_ref()))
}

/// Strip trailing entity suffixes ("ACME HOLDINGS LLC" → "ACME HOLDINGS")
///
/// Returns the normalized input unchanged when nothing would remain.
pub fn strip_entity_suffix(raw: &str) -> String {
    let normalized = normalize_name(raw).replace(',', "");
    let mut words: Vec<&str> = normalized.split_whitespace().collect();
    while words.len() > 1 && words.last().map_or(false, |w| ENTITY_SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}

/// Deduplication key for a person name
///
/// "SMITH, JOHN A JR" and "John A. Smith" share a key.
pub fn person_key(raw: &str) -> String {
    person_tokens(&normalize_name(raw)).join(" ")
}

/// Canonical display form of a name
///
/// Title case, with corporate abbreviations kept upper-case. Person names in
/// "LAST, FIRST" form are reordered.
pub fn display_name(raw: &str) -> String {
    const KEEP_UPPER: &[&str] = &[
        "LLC", "INC", "LP", "LLP", "PLLC", "LTD", "PC", "PA", "NA", "CO", "CORP", "LLLP",
        "II", "III", "IV", "USA", "US", "REIT",
    ];

    let normalized = normalize_name(raw);
    let words: Vec<String> = match classify(raw) {
        NameKind::Person => {
            let mut v = person_tokens(&normalized);
            let suffixes: Vec<String> = tokens(&normalized)
                .into_iter()
                .filter(|t| GENERATIONAL_SUFFIXES.contains(t))
                .map(str::to_string)
                .collect();
            v.extend(suffixes);
            v
        }
        NameKind::Entity => normalized.replace(',', "").split_whitespace().map(str::to_string).collect(),
    };

    words
        .iter()
        .map(|w| {
            if KEEP_UPPER.contains(&w.as_str()) {
                w.clone()
            } else {
                title_case(w)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut start = true;
    for ch in word.chars() {
        if start {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        start = matches!(ch, '-' | '\'' | '/' | '&');
    }
    out
}

/// Franchise brands mentioned in a name
pub fn franchise_brands(raw: &str) -> Vec<&'static str> {
    let normalized = normalize_name(raw)
        .replace('\'', "")
        .replace(['-', ','], " ");
    let name_tokens: Vec<&str> = normalized.split_whitespace().collect();
    FRANCHISE_BRANDS
        .iter()
        .filter(|brand| {
            let brand_tokens: Vec<&str> = brand.split(' ').collect();
            contains_sequence(&name_tokens, &brand_tokens)
        })
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_keywords() {
        assert_eq!(classify("ACME HOLDINGS LLC"), NameKind::Entity);
        assert_eq!(classify("Smith Family Trust"), NameKind::Entity);
        assert_eq!(classify("Blue Ridge Properties, Inc."), NameKind::Entity);
    }

    #[test]
    fn test_spaced_initialism_is_entity() {
        assert_eq!(normalize_name("L L C VENTURES"), "LLC VENTURES");
        assert_eq!(classify("L L C VENTURES"), NameKind::Entity);
        assert_eq!(classify("Oak Street L.L.C."), NameKind::Entity);
    }

    #[test]
    fn test_person_forms() {
        assert_eq!(classify("JOHN A SMITH"), NameKind::Person);
        assert_eq!(classify("Mary Johnson"), NameKind::Person);
        assert_eq!(classify("SMITH, JOHN A"), NameKind::Person);
        assert_eq!(classify("Robert Lee Brown Jr."), NameKind::Person);
        // Unknown first name rescued by a middle initial
        assert_eq!(classify("Zebulon Q Pike"), NameKind::Person);
    }

    #[test]
    fn test_ambiguous_is_entity() {
        assert_eq!(classify("ZEBULON PIKE"), NameKind::Entity);
        assert_eq!(classify("MAPLE"), NameKind::Entity);
        assert_eq!(classify("JOHN SMITH HOMES"), NameKind::Entity);
        assert_eq!(classify("JAMES WILLIAM ROBERT THOMAS HENRY"), NameKind::Entity);
    }

    #[test]
    fn test_classifier_is_total() {
        for input in ["", "   ", ".", ",,,", "1234", "&", "A", "é ñ ü", "\u{0}", "SMITH,"] {
            let _ = classify(input);
            let _ = is_valid_officer_name(input);
            let _ = is_privacy_protected_officer(input);
            let _ = display_name(input);
            let _ = strip_entity_suffix(input);
        }
        assert_eq!(classify(""), NameKind::Entity);
    }

    #[test]
    fn test_officer_placeholders_rejected() {
        assert!(!is_valid_officer_name("POSITIONS INCLUDE MANAGER"));
        assert!(!is_valid_officer_name("Information on file"));
        assert!(!is_valid_officer_name("N/A"));
        assert!(!is_valid_officer_name("unknown"));
        assert!(!is_valid_officer_name("Registered Agent"));
        assert!(!is_valid_officer_name("The Managing Member"));
        assert!(!is_valid_officer_name("AND JANE DOE"));
        assert!(!is_valid_officer_name("JOHN SMITH &"));
        assert!(!is_valid_officer_name("PRESIDENT OR OFFICER OF RECORD"));
        assert!(!is_valid_officer_name("X"));
        assert!(!is_valid_officer_name("12345"));
    }

    #[test]
    fn test_officer_real_names_accepted() {
        assert!(is_valid_officer_name("JOHN A SMITH"));
        assert!(is_valid_officer_name("Acme Holdings LLC"));
        assert!(is_valid_officer_name("NORTHWEST REGISTERED AGENT LLC"));
        assert!(is_valid_officer_name("ANDERSON, ORVILLE"));
    }

    #[test]
    fn test_privacy_agents() {
        assert!(is_privacy_protected_officer("CORPORATION SERVICE COMPANY"));
        assert!(is_privacy_protected_officer("C T Corporation System"));
        assert!(is_privacy_protected_officer("Northwest Registered Agent, LLC"));
        assert!(!is_privacy_protected_officer("CSCOTT ENTERPRISES"));
        assert!(!is_privacy_protected_officer("JOHN SMITH"));
    }

    #[test]
    fn test_only_privacy_officers() {
        assert!(has_only_privacy_protected_officers(&["CORPORATION SERVICE COMPANY"]));
        assert!(has_only_privacy_protected_officers(&[
            "CSC",
            "Acme Holdings LLC"
        ]));
        assert!(has_only_privacy_protected_officers(&["Acme Holdings LLC"]));
        assert!(!has_only_privacy_protected_officers(&[
            "CORPORATION SERVICE COMPANY",
            "JOHN A SMITH"
        ]));
        assert!(!has_only_privacy_protected_officers::<&str>(&[]));
    }

    #[test]
    fn test_strip_suffix_and_person_key() {
        assert_eq!(strip_entity_suffix("Acme Holdings, LLC"), "ACME HOLDINGS");
        assert_eq!(strip_entity_suffix("LLC"), "LLC");
        assert_eq!(person_key("SMITH, JOHN A JR"), person_key("John A. Smith"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("ACME HOLDINGS LLC"), "Acme Holdings LLC");
        assert_eq!(display_name("SMITH, JOHN A"), "John A Smith");
        assert_eq!(display_name("o'brien-kelly properties inc"), "O'Brien-Kelly Properties INC");
    }

    #[test]
    fn test_franchise_brands() {
        assert_eq!(franchise_brands("Wendy's of Ohio LLC"), vec!["WENDYS"]);
        assert_eq!(franchise_brands("Chick-fil-A Store 42"), vec!["CHICK FIL A"]);
        assert!(franchise_brands("ACME HOLDINGS").is_empty());
    }
}
