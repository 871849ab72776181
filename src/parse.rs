use crate::error::{Result, RhymeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Letters that count as vowels for lexeme acceptance
pub const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];

/// Characters kept by the edge trim (lowercase ASCII letters and apostrophes)
fn is_lexeme_char(c: char) -> bool {
    c.is_ascii_lowercase() || c == '\''
}

pub fn has_vowel(s: &str) -> bool {
    s.chars().any(|c| VOWELS.contains(&c.to_ascii_lowercase()))
}

/// Split a trailing alternate-pronunciation marker like `(1)` or `(12)` off a token
fn split_variant_marker(s: &str) -> (&str, Option<&str>) {
    let Some(body) = s.strip_suffix(')') else {
        return (s, None);
    };
    match body.rfind('(') {
        Some(open) => {
            let digits = &body[open + 1..];
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                (&body[..open], Some(digits))
            } else {
                (s, None)
            }
        }
        None => (s, None),
    }
}

/// Numeric alternate-pronunciation index of a raw key: `rob` -> 0, `rob(2)` -> 2, `rob(10)` -> 10
pub fn variant_index(raw: &str) -> u32 {
    match split_variant_marker(raw.trim()) {
        (_, Some(digits)) => digits.parse().unwrap_or(u32::MAX),
        (_, None) => 0,
    }
}

/// Letter runs separated by single internal apostrophes: `^[a-z]+('[a-z]+)*$`
fn is_lexeme_shape(s: &str) -> bool {
    !s.is_empty()
        && s
            .split('\'')
            .all(|run| !run.is_empty() && run.bytes().all(|b| b.is_ascii_lowercase()))
}

/// Loose cleanup: trim, lowercase and drop edge characters that are not letters or apostrophes.
/// Never rejects, so "co-op" stays "co-op" and "brrr" stays "brrr".
pub fn normalize_token(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .trim_matches(|c: char| !is_lexeme_char(c))
        .to_string()
}

/// Turn a raw token into a dictionary lookup key, or the empty string if it is not one.
///
/// e.g. "ROB(1)" -> "rob", "don't" -> "don't", "co-op" -> "", "b" -> "", "brrr" -> ""
pub fn normalize_lexeme(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let (unmarked, _) = split_variant_marker(&lowered);
    let word = unmarked.trim_matches(|c: char| !is_lexeme_char(c));

    if !is_lexeme_shape(word) || word.len() < 2 || !has_vowel(word) {
        return String::new();
    }
    word.to_string()
}

/// A normalized lexeme; only constructible through [`normalize_lexeme`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Lexeme(String);

impl Lexeme {
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = normalize_lexeme(raw);
        if normalized.is_empty() {
            Err(RhymeError::InvalidInput(raw.to_string()))
        } else {
            Ok(Lexeme(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Lexeme {
    type Error = RhymeError;

    fn try_from(raw: String) -> Result<Self> {
        Lexeme::new(&raw)
    }
}

impl From<Lexeme> for String {
    fn from(lexeme: Lexeme) -> Self {
        lexeme.0
    }
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
