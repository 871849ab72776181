use crate::error::{Result, RhymeError};
use crate::rank::DEFAULT_CAP;
use crate::resolver::{build_db_url, CURRENT_VERSION};
use serde::{Deserialize, Serialize};

/// Engine settings; every field has a default so `{}` is a valid config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Origin the dictionary asset is served from
    pub origin: String,
    /// Dictionary schema version to load; pin an older one to roll back
    pub version: u32,
    /// Suggestion cap for requests that do not set their own
    pub cap: usize,
    /// Cached query results; 0 disables the cache
    pub cache_capacity: usize,
    /// Debounce echoed in result metadata for requests that do not set their own
    pub debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            origin: "http://localhost:3000".to_string(),
            version: CURRENT_VERSION,
            cap: DEFAULT_CAP,
            cache_capacity: 64,
            debounce_ms: 150,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RhymeError::InvalidInput(format!("Failed to parse config: {}", e)))
    }

    pub fn db_url(&self) -> String {
        build_db_url(&self.origin, self.version)
    }
}
