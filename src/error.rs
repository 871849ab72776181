use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by the rhyme engine and its worker client
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum RhymeError {
    #[error("invalid input: {0:?}")]
    InvalidInput(String),

    #[error("dictionary load failed: {0}")]
    DictionaryLoad(String),

    #[error("dictionary version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("worker client terminated")]
    ClientTerminated,

    #[error("malformed worker response: {0}")]
    MalformedResponse(String),
}

impl RhymeError {
    /// True for every failure that happens while fetching or parsing the dictionary
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            RhymeError::DictionaryLoad(_) | RhymeError::VersionMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RhymeError>;
