use std::cell::RefCell;
use wasm_bindgen::prelude::*;

pub mod build;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod parse;
pub mod protocol;
pub mod query;
pub mod rank;
pub mod resolver;
pub mod telemetry;
pub mod types;

pub use crate::build::RhymeDatabase;
pub use crate::client::{shared_client, shared_status, WorkerClient};
pub use crate::config::EngineConfig;
pub use crate::error::{Result, RhymeError};
pub use crate::parse::{normalize_token, Lexeme};
pub use crate::query::query_rhymes;
pub use crate::rank::build_visible_suggestions;
pub use crate::resolver::CURRENT_VERSION;
pub use crate::types::{ClientState, Mode, QueryRequest, QueryResult, RhymeSuggestionDebug};

use crate::protocol::WorkerHost;

/// Milliseconds since the Unix epoch
#[cfg(target_arch = "wasm32")]
pub(crate) fn now_ms() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn perf_log(line: &str) {
    web_sys::console::log_1(&line.into());
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn perf_log(line: &str) {
    tracing::debug!("{}", line);
}

// Worker-side state when this module runs inside a browser Web Worker
thread_local! {
    static HOST: RefCell<WorkerHost> = RefCell::new(WorkerHost::new(None));
}

/// Install the rhyme dictionary from its JSON document
/// db_json: the versioned asset body; version: the version the caller asked for
#[wasm_bindgen]
pub fn init_engine(db_json: &str, version: u32) -> std::result::Result<(), JsError> {
    HOST.with(|host| {
        host.borrow_mut()
            .install(db_json, version)
            .map(|_| ())
            .map_err(|e| JsError::new(&format!("Failed to load dictionary: {}", e)))
    })
}

/// Check if a dictionary has been installed
#[wasm_bindgen]
pub fn is_engine_ready() -> bool {
    HOST.with(|host| host.borrow().database().is_some())
}

/// Query rhymes and return the JSON QueryResult.
/// Falls back to the local generator until a dictionary is installed.
#[wasm_bindgen]
pub fn get_rhymes(request_json: &str) -> std::result::Result<String, JsError> {
    let request: QueryRequest = serde_json::from_str(request_json)
        .map_err(|e| JsError::new(&format!("Failed to parse request: {}", e)))?;

    let start = now_ms();
    let result = HOST.with(|host| query_rhymes(host.borrow().database(), &request));
    telemetry::track_request((now_ms() - start).max(0.0).round() as u64);
    serde_json::to_string(&result).map_err(|e| JsError::new(&e.to_string()))
}

/// Worker message handler: one JSON request in, one JSON reply out (empty for shutdown)
#[wasm_bindgen]
pub fn handle_message(message: &str) -> String {
    HOST.with(|host| host.borrow_mut().handle_json(message))
        .unwrap_or_default()
}

/// Normalize a raw token into a lookup key ("" if rejected)
#[wasm_bindgen]
pub fn normalize_lexeme(raw: &str) -> String {
    parse::normalize_lexeme(raw)
}

/// Versioned dictionary URL; defaults to the current version
#[wasm_bindgen]
pub fn build_db_url(origin: &str, version: Option<u32>) -> String {
    resolver::build_db_url(origin, version.unwrap_or(CURRENT_VERSION))
}

/// JSON snapshot of the telemetry counters
#[wasm_bindgen]
pub fn get_telemetry() -> String {
    serde_json::to_string(&telemetry::get_telemetry()).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::SAMPLE_DB;

    fn setup_test_engine() {
        init_engine(SAMPLE_DB, CURRENT_VERSION).expect("Failed to initialize test engine");
    }

    #[test]
    fn test_get_rhymes() {
        setup_test_engine();
        assert!(is_engine_ready());

        let results_json =
            get_rhymes(r#"{"rawTarget": "Mate", "activeModes": ["caret"], "cap": 3}"#).unwrap();
        let result: QueryResult = serde_json::from_str(&results_json).unwrap();
        assert_eq!(result.words(Mode::Caret), ["fate", "late", "gate"]);
        assert!(result.debug[&Mode::Caret].cap.as_ref().unwrap().applied);
    }

    #[test]
    fn test_get_rhymes_invalid_input() {
        let results_json = get_rhymes(r#"{"rawTarget": "brrr", "activeModes": ["lineLast"]}"#).unwrap();
        let result: QueryResult = serde_json::from_str(&results_json).unwrap();
        assert!(result.words(Mode::LineLast).is_empty());
        assert_eq!(result.debug[&Mode::LineLast].rejections["invalid-input"], 1);
    }

    #[test]
    fn test_handle_message() {
        setup_test_engine();
        let reply = handle_message(
            r#"{"type": "query", "id": 11, "request": {"rawTarget": "rob", "activeModes": ["caret"]}}"#,
        );
        let reply = protocol::decode_reply(&reply).unwrap();
        assert_eq!(reply.id(), 11);
        assert_eq!(handle_message("garbage"), "");
    }

    #[test]
    fn test_exported_helpers() {
        assert_eq!(normalize_lexeme("ROB(1)"), "rob");
        assert_eq!(
            build_db_url("http://localhost:3000", None),
            "http://localhost:3000/rhyme-db/rhyme-db.v2.json?v=2"
        );
        assert_eq!(
            build_db_url("http://localhost:3000", Some(1)),
            "http://localhost:3000/rhyme-db/rhyme-db.v1.json?v=1"
        );
        let snapshot: types::TelemetrySnapshot = serde_json::from_str(&get_telemetry()).unwrap();
        assert!(snapshot.last_latency_ms.len() <= telemetry::LATENCY_WINDOW);
    }
}
