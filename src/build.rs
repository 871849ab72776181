use crate::error::{Result, RhymeError};
use crate::parse::{normalize_lexeme, variant_index, Lexeme};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Dictionary document as served: lexeme -> phonetic key, phonetic key -> candidates
#[derive(Debug, Deserialize)]
struct RawDatabase {
    version: u32,
    #[serde(default)]
    words: BTreeMap<String, String>,
    #[serde(default)]
    rhymes: HashMap<String, Vec<String>>,
}

/// Immutable phonetic dictionary loaded from a versioned asset
#[derive(Debug, Clone)]
pub struct RhymeDatabase {
    version: u32,
    /// normalized lexeme -> phonetic keys, alternate pronunciations in ascending variant order
    words: HashMap<String, Vec<String>>,
    /// phonetic key -> candidates, pre-ranked by phonetic closeness
    rhymes: HashMap<String, Vec<String>>,
}

/// Normalize every dictionary key, tagging it with its alternate-pronunciation index
#[cfg(feature = "native")]
fn normalize_keys(words: &BTreeMap<String, String>) -> Vec<(String, u32, &String)> {
    use rayon::prelude::*;
    words
        .par_iter()
        .map(|(raw, key)| (normalize_lexeme(raw), variant_index(raw), key))
        .collect()
}

#[cfg(not(feature = "native"))]
fn normalize_keys(words: &BTreeMap<String, String>) -> Vec<(String, u32, &String)> {
    words
        .iter()
        .map(|(raw, key)| (normalize_lexeme(raw), variant_index(raw), key))
        .collect()
}

impl RhymeDatabase {
    /// Parse a dictionary document and check it carries `expected_version`
    pub fn from_json(json: &str, expected_version: u32) -> Result<Self> {
        let raw: RawDatabase = serde_json::from_str(json)
            .map_err(|e| RhymeError::DictionaryLoad(format!("Failed to parse dictionary: {}", e)))?;

        if raw.version != expected_version {
            return Err(RhymeError::VersionMismatch {
                expected: expected_version,
                found: raw.version,
            });
        }

        let mut words: HashMap<String, Vec<String>> = HashMap::new();
        let mut dropped = 0usize;
        let mut entries = normalize_keys(&raw.words);
        // `rob(2)` before `rob(10)`; ties keep raw-key order
        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        for (lexeme, _, key) in entries {
            if lexeme.is_empty() {
                dropped += 1;
                continue;
            }
            let keys = words.entry(lexeme).or_default();
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }

        tracing::debug!(
            version = raw.version,
            words = words.len(),
            families = raw.rhymes.len(),
            dropped,
            "built rhyme database"
        );

        Ok(RhymeDatabase {
            version: raw.version,
            words,
            rhymes: raw.rhymes,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of distinct lookup lexemes
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Candidate pool for a lexeme; `None` when the dictionary has no entry for it
    pub fn lookup(&self, lexeme: &Lexeme) -> Option<Vec<String>> {
        let keys = self.words.get(lexeme.as_str())?;
        Some(
            keys.iter()
                .filter_map(|key| self.rhymes.get(key))
                .flatten()
                .cloned()
                .collect(),
        )
    }
}

/// Small v2 dictionary shared by unit tests
#[cfg(test)]
pub(crate) const SAMPLE_DB: &str = r#"{
    "version": 2,
    "words": {
        "mate": "EY T",
        "late": "EY T",
        "rob": "AA B",
        "rob(1)": "AO B",
        "co-op": "UW P",
        "brrr": "ER"
    },
    "rhymes": {
        "EY T": ["mate", "fate", "late", "gate", "date"],
        "AA B": ["job", "cob", "mob"],
        "AO B": ["daub"]
    }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_normalizes_keys() {
        let db = RhymeDatabase::from_json(SAMPLE_DB, 2).unwrap();
        assert_eq!(db.version(), 2);
        // co-op and brrr fail normalization, rob(1) folds into rob
        assert_eq!(db.word_count(), 3);
    }

    #[test]
    fn test_alternate_pronunciations_concatenate() {
        let db = RhymeDatabase::from_json(SAMPLE_DB, 2).unwrap();
        let rob = Lexeme::new("ROB").unwrap();
        assert_eq!(db.lookup(&rob).unwrap(), vec!["job", "cob", "mob", "daub"]);
    }

    #[test]
    fn test_alternates_follow_numeric_variant_order() {
        let mut words = serde_json::Map::new();
        let mut rhymes = serde_json::Map::new();
        for n in 0..=11u32 {
            let raw = if n == 0 { "rob".to_string() } else { format!("rob({n})") };
            words.insert(raw, format!("K{n}").into());
            rhymes.insert(format!("K{n}"), serde_json::json!([format!("w{n}")]));
        }
        let json = serde_json::json!({"version": 2, "words": words, "rhymes": rhymes}).to_string();

        let db = RhymeDatabase::from_json(&json, 2).unwrap();
        let expected: Vec<String> = (0..=11).map(|n| format!("w{n}")).collect();
        assert_eq!(db.lookup(&Lexeme::new("rob").unwrap()).unwrap(), expected);
    }

    #[test]
    fn test_lookup_miss() {
        let db = RhymeDatabase::from_json(SAMPLE_DB, 2).unwrap();
        assert!(db.lookup(&Lexeme::new("orange").unwrap()).is_none());
    }

    #[test]
    fn test_version_mismatch() {
        let err = RhymeDatabase::from_json(SAMPLE_DB, 3).unwrap_err();
        assert_eq!(err, RhymeError::VersionMismatch { expected: 3, found: 2 });
    }

    #[test]
    fn test_malformed_json() {
        let err = RhymeDatabase::from_json("{not json", 2).unwrap_err();
        assert!(matches!(err, RhymeError::DictionaryLoad(_)));
    }
}
