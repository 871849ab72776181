use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Query context: the word being typed, or the last word of the current line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Caret,
    LineLast,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Caret => write!(f, "caret"),
            Mode::LineLast => write!(f, "lineLast"),
        }
    }
}

/// One rhyme lookup issued by the editor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Raw word used by every active mode without an override
    pub raw_target: String,
    pub active_modes: BTreeSet<Mode>,
    /// Per-mode raw words (caret word vs last word of the line)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mode_targets: BTreeMap<Mode, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<usize>,
    /// Caller-side debounce, recorded in debug output only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

impl QueryRequest {
    pub fn new(raw_target: impl Into<String>, modes: impl IntoIterator<Item = Mode>) -> Self {
        QueryRequest {
            raw_target: raw_target.into(),
            active_modes: modes.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_target(mut self, mode: Mode, raw: impl Into<String>) -> Self {
        self.active_modes.insert(mode);
        self.mode_targets.insert(mode, raw.into());
        self
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn with_debounce(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = Some(debounce_ms);
        self
    }

    /// Raw word a mode should query
    pub fn target_for(&self, mode: Mode) -> &str {
        self.mode_targets
            .get(&mode)
            .map(String::as_str)
            .unwrap_or(&self.raw_target)
    }
}

/// Truncation metadata for a debug record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapInfo {
    pub applied: bool,
    pub limit: usize,
    pub stage: String,
}

/// Timing metadata for a debug record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingMeta {
    /// Milliseconds since the Unix epoch when the result was produced
    pub updated_at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

/// Per-mode diagnostics attached to a query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RhymeSuggestionDebug {
    pub raw_target: String,
    pub normalized_target: String,
    pub active_modes: Vec<Mode>,
    /// Candidate source label: "dictionary" or "fallback"
    pub source: String,
    pub pool_count: usize,
    pub filtered_count: usize,
    pub rendered_count: usize,
    /// stage name -> survivors after that stage
    pub stage_counts: BTreeMap<String, usize>,
    /// rejection reason -> number of candidates dropped for it
    pub rejections: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<CapInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<TimingMeta>,
}

impl RhymeSuggestionDebug {
    pub fn reject(&mut self, reason: &str, count: usize) {
        if count > 0 {
            *self.rejections.entry(reason.to_string()).or_insert(0) += count;
        }
    }

    pub fn stage(&mut self, name: &str, survivors: usize) {
        self.stage_counts.insert(name.to_string(), survivors);
    }
}

/// Ranked candidates and diagnostics for every active mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub results: BTreeMap<Mode, Vec<String>>,
    pub debug: BTreeMap<Mode, RhymeSuggestionDebug>,
}

impl QueryResult {
    pub fn words(&self, mode: Mode) -> &[String] {
        self.results.get(&mode).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Restamp the timing block of every debug record
    pub fn touch(&mut self, updated_at: f64, debounce_ms: Option<u64>) {
        for debug in self.debug.values_mut() {
            debug.meta = Some(TimingMeta {
                updated_at,
                debounce_ms,
            });
        }
    }
}

/// Lifecycle of the worker client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientState {
    Uninitialized,
    Initializing,
    Ready,
    Error,
    Terminated,
}

/// Copy of the process-wide telemetry counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub errors: u64,
    pub last_latency_ms: Vec<u64>,
}
