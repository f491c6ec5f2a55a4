//! US address tokenizer
//!
//! Splits a one-line US address ("123 North Main Street Apt 4, Springfield, IL
//! 62704") into standardized components. This is a "good enough" splitter used
//! when no verification provider is configured, and to feed one when it is.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("Empty address")]
    Empty,

    #[error("Could not parse state from address (expected \"123 Main St, City, ST 12345\")")]
    MissingState,

    #[error("Could not parse city from address")]
    MissingCity,
}

/// Standardized address components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAddress {
    /// Street line ("123 N MAIN ST")
    pub line1: String,
    /// Unit line ("APT 4")
    pub line2: Option<String>,
    pub city: String,
    /// Two-letter state code
    pub state: String,
    /// 5 or 9 digit ZIP without the dash
    pub postal_code: Option<String>,
}

impl ParsedAddress {
    /// Single-line rendering ("123 N MAIN ST APT 4, SPRINGFIELD, IL 62704")
    pub fn one_line(&self) -> String {
        let mut street = self.line1.clone();
        if let Some(unit) = &self.line2 {
            street.push(' ');
            street.push_str(unit);
        }
        match &self.postal_code {
            Some(zip) => format!("{}, {}, {} {}", street, self.city, self.state, zip),
            None => format!("{}, {}, {}", street, self.city, self.state),
        }
    }

    /// First five digits of the ZIP code
    pub fn zip5(&self) -> Option<&str> {
        self.postal_code.as_deref().and_then(|z| z.get(..5))
    }
}

const STREET_TYPES: &[(&str, &str)] = &[
    ("STREET", "ST"),
    ("AVENUE", "AVE"),
    ("BOULEVARD", "BLVD"),
    ("DRIVE", "DR"),
    ("ROAD", "RD"),
    ("LANE", "LN"),
    ("COURT", "CT"),
    ("PLACE", "PL"),
    ("CIRCLE", "CIR"),
    ("HIGHWAY", "HWY"),
    ("PARKWAY", "PKWY"),
    ("TERRACE", "TER"),
    ("TRAIL", "TRL"),
    ("SQUARE", "SQ"),
    ("WAY", "WAY"),
];

const DIRECTIONS: &[(&str, &str)] = &[
    ("NORTH", "N"),
    ("SOUTH", "S"),
    ("EAST", "E"),
    ("WEST", "W"),
    ("NORTHEAST", "NE"),
    ("NORTHWEST", "NW"),
    ("SOUTHEAST", "SE"),
    ("SOUTHWEST", "SW"),
];

const UNIT_DESIGNATORS: &[&str] = &["APT", "APARTMENT", "UNIT", "STE", "SUITE", "#"];

/// Abbreviate street types and directions in a street line
pub fn standardize_street(line: &str) -> String {
    line.split_whitespace()
        .map(|word| {
            let upper = word.trim_end_matches('.').to_uppercase();
            STREET_TYPES
                .iter()
                .chain(DIRECTIONS.iter())
                .find(|(long, _)| *long == upper)
                .map(|(_, short)| short.to_string())
                .unwrap_or(upper)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_street_type(word: &str) -> bool {
    STREET_TYPES
        .iter()
        .any(|(long, short)| *long == word || *short == word)
}

fn is_zip(token: &str) -> bool {
    let digits_ok = |s: &str, n: usize| s.len() == n && s.chars().all(|c| c.is_ascii_digit());
    match token.split_once('-') {
        Some((five, four)) => digits_ok(five, 5) && digits_ok(four, 4),
        None => digits_ok(token, 5) || digits_ok(token, 9),
    }
}

fn is_state(token: &str) -> bool {
    token.len() == 2 && token.chars().all(|c| c.is_ascii_alphabetic())
}

/// Parse a one-line US address
///
/// State and ZIP are read from the end; a comma-separated city wins, otherwise
/// the city is whatever follows the last street-type word.
pub fn parse_full_address(raw: &str) -> Result<ParsedAddress, AddressParseError> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    if cleaned.is_empty() {
        return Err(AddressParseError::Empty);
    }

    // Tail: "..., ST 12345" or "..., ST"
    let mut words: Vec<&str> = cleaned.split(' ').collect();
    let mut postal_code = None;
    if let Some(last) = words.last() {
        if is_zip(last) {
            postal_code = Some(last.replace('-', ""));
            words.pop();
        }
    }

    let state = match words.last().map(|w| w.trim_matches(',')) {
        Some(w) if is_state(w) => w.to_string(),
        _ => return Err(AddressParseError::MissingState),
    };
    words.pop();

    let remaining = words.join(" ");
    let remaining = remaining.trim().trim_end_matches(',').trim();
    let parts: Vec<&str> = remaining
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let (street, city) = if parts.len() >= 2 {
        (parts[..parts.len() - 1].join(", "), parts[parts.len() - 1].to_string())
    } else {
        let tokens: Vec<&str> = remaining.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(AddressParseError::MissingCity);
        }
        let split_at = tokens
            .iter()
            .rposition(|t| is_street_type(t.trim_end_matches('.')))
            .map(|i| i + 1)
            .filter(|i| *i < tokens.len())
            .unwrap_or(tokens.len() - 1);
        (tokens[..split_at].join(" "), tokens[split_at..].join(" "))
    };

    if city.is_empty() {
        return Err(AddressParseError::MissingCity);
    }

    let (street, unit) = split_unit(&street);

    Ok(ParsedAddress {
        line1: standardize_street(&street),
        line2: unit,
        city,
        state,
        postal_code,
    })
}

/// Split a trailing unit designator ("APT 4", "#12") off a street line
fn split_unit(street: &str) -> (String, Option<String>) {
    let tokens: Vec<&str> = street.split_whitespace().collect();
    let n = tokens.len();

    if n >= 2 {
        if let Some(glued) = tokens[n - 1].strip_prefix('#').filter(|s| !s.is_empty()) {
            return (tokens[..n - 1].join(" "), Some(format!("# {}", glued)));
        }
    }
    if n >= 3 && UNIT_DESIGNATORS.contains(&tokens[n - 2]) {
        let designator = match tokens[n - 2] {
            "APARTMENT" => "APT",
            "SUITE" => "STE",
            other => other,
        };
        return (
            tokens[..n - 2].join(" "),
            Some(format!("{} {}", designator, tokens[n - 1])),
        );
    }

    (street.to_string(), None)
}
