use crate::build::RhymeDatabase;
use crate::fallback::generate_candidates;
use crate::parse::{normalize_lexeme, Lexeme};
use crate::rank::{apply_cap, DEFAULT_CAP, RENDER_STAGE};
use crate::types::{Mode, QueryRequest, QueryResult, RhymeSuggestionDebug, TimingMeta};
use crate::{now_ms, perf_log};
use std::collections::HashSet;

pub const REJECT_INVALID_INPUT: &str = "invalid-input";
pub const REJECT_NOT_FOUND: &str = "not-found";
pub const REJECT_INVALID_CANDIDATE: &str = "invalid-candidate";
pub const REJECT_DUPLICATE: &str = "duplicate";
pub const REJECT_SELF_MATCH: &str = "self-match";

/// Where a mode's raw candidate pool comes from
pub trait CandidateSource {
    fn label(&self) -> &'static str;

    /// Raw pool for a target; `None` when the source has no entry for it
    fn candidates(&self, target: &Lexeme) -> Option<Vec<String>>;
}

impl CandidateSource for RhymeDatabase {
    fn label(&self) -> &'static str {
        "dictionary"
    }

    fn candidates(&self, target: &Lexeme) -> Option<Vec<String>> {
        self.lookup(target)
    }
}

/// Degraded-mode source used while no dictionary is loaded
pub struct FallbackGenerator;

impl CandidateSource for FallbackGenerator {
    fn label(&self) -> &'static str {
        "fallback"
    }

    fn candidates(&self, target: &Lexeme) -> Option<Vec<String>> {
        Some(generate_candidates(target.as_str()))
    }
}

/// Run one mode through the filter pipeline. Candidates keep their stored order.
fn query_mode(
    source: &dyn CandidateSource,
    raw_target: &str,
    request: &QueryRequest,
) -> (Vec<String>, RhymeSuggestionDebug) {
    let mut debug = RhymeSuggestionDebug {
        raw_target: raw_target.to_string(),
        normalized_target: normalize_lexeme(raw_target),
        active_modes: request.active_modes.iter().copied().collect(),
        source: source.label().to_string(),
        ..Default::default()
    };
    let cap = request.cap.unwrap_or(DEFAULT_CAP);

    let Ok(target) = Lexeme::new(raw_target) else {
        debug.reject(REJECT_INVALID_INPUT, 1);
        debug.stage("pool", 0);
        let (_, info) = apply_cap::<String>(&[], cap, RENDER_STAGE);
        debug.cap = Some(info);
        return (Vec::new(), debug);
    };

    let pool = match source.candidates(&target) {
        Some(pool) => pool,
        None => {
            debug.reject(REJECT_NOT_FOUND, 1);
            Vec::new()
        }
    };
    debug.pool_count = pool.len();
    debug.stage("pool", pool.len());

    // shape: every candidate must itself be a lookup-grade lexeme
    let mut shaped = Vec::with_capacity(pool.len());
    for candidate in pool {
        match Lexeme::new(&candidate) {
            Ok(lexeme) => shaped.push(String::from(lexeme)),
            Err(_) => debug.reject(REJECT_INVALID_CANDIDATE, 1),
        }
    }
    debug.stage("shape", shaped.len());

    // normalized forms are lowercase, so this dedupe is case-insensitive
    let mut seen = HashSet::new();
    let before = shaped.len();
    shaped.retain(|word| seen.insert(word.clone()));
    debug.reject(REJECT_DUPLICATE, before - shaped.len());
    debug.stage("dedupe", shaped.len());

    let before = shaped.len();
    shaped.retain(|word| word != target.as_str());
    debug.reject(REJECT_SELF_MATCH, before - shaped.len());
    debug.stage("self", shaped.len());

    debug.filtered_count = shaped.len();
    let (visible, info) = apply_cap(&shaped, cap, RENDER_STAGE);
    debug.cap = Some(info);
    debug.rendered_count = visible.len();
    debug.stage(RENDER_STAGE, visible.len());

    (visible, debug)
}

/// Rank rhymes for every active mode. Uses the fallback generator when `database` is `None`.
///
/// Never fails: bad input yields an empty list with an `invalid-input` rejection.
pub fn query_rhymes(database: Option<&RhymeDatabase>, request: &QueryRequest) -> QueryResult {
    let start = now_ms();
    let source: &dyn CandidateSource = match database {
        Some(db) => db,
        None => &FallbackGenerator,
    };

    let mut result = QueryResult::default();
    for &mode in &request.active_modes {
        let (words, debug) = query_mode(source, request.target_for(mode), request);
        result.results.insert(mode, words);
        result.debug.insert(mode, debug);
    }

    let updated_at = now_ms();
    for debug in result.debug.values_mut() {
        debug.meta = Some(TimingMeta {
            updated_at,
            debounce_ms: request.debounce_ms,
        });
    }

    perf_log(&format!(
        "[perf] rhymes target='{}' source={} modes={} caret={} lineLast={} | total={:.1}ms",
        request.raw_target,
        source.label(),
        request.active_modes.len(),
        result.words(Mode::Caret).len(),
        result.words(Mode::LineLast).len(),
        updated_at - start
    ));

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::SAMPLE_DB;

    fn sample_db() -> RhymeDatabase {
        RhymeDatabase::from_json(SAMPLE_DB, 2).unwrap()
    }

    fn assert_count_invariant(result: &QueryResult) {
        for debug in result.debug.values() {
            assert!(debug.rendered_count <= debug.filtered_count);
            assert!(debug.filtered_count <= debug.pool_count);
        }
    }

    #[test]
    fn test_dictionary_lookup_removes_self() {
        let db = sample_db();
        let result = query_rhymes(Some(&db), &QueryRequest::new("Mate", [Mode::Caret]));
        assert_eq!(result.words(Mode::Caret), ["fate", "late", "gate", "date"]);

        let debug = &result.debug[&Mode::Caret];
        assert_eq!(debug.normalized_target, "mate");
        assert_eq!(debug.source, "dictionary");
        assert_eq!(debug.pool_count, 5);
        assert_eq!(debug.filtered_count, 4);
        assert_eq!(debug.rendered_count, 4);
        assert_eq!(debug.rejections[REJECT_SELF_MATCH], 1);
        assert_eq!(debug.stage_counts["pool"], 5);
        assert_eq!(debug.stage_counts["self"], 4);
        assert!(!debug.cap.as_ref().unwrap().applied);
        assert_count_invariant(&result);
    }

    #[test]
    fn test_modes_are_independent() {
        let db = sample_db();
        let request = QueryRequest::new("", [])
            .with_target(Mode::Caret, "brrr")
            .with_target(Mode::LineLast, "late");
        let result = query_rhymes(Some(&db), &request);

        assert!(result.words(Mode::Caret).is_empty());
        let caret = &result.debug[&Mode::Caret];
        assert_eq!(caret.filtered_count, 0);
        assert_eq!(caret.rejections[REJECT_INVALID_INPUT], 1);

        assert_eq!(result.words(Mode::LineLast), ["mate", "fate", "gate", "date"]);
        assert!(result.debug[&Mode::LineLast].rejections.get(REJECT_INVALID_INPUT).is_none());
        assert_count_invariant(&result);
    }

    #[test]
    fn test_cap_is_recorded() {
        let db = sample_db();
        let request = QueryRequest::new("mate", [Mode::Caret]).with_cap(2);
        let result = query_rhymes(Some(&db), &request);
        assert_eq!(result.words(Mode::Caret), ["fate", "late"]);

        let debug = &result.debug[&Mode::Caret];
        let cap = debug.cap.as_ref().unwrap();
        assert!(cap.applied);
        assert_eq!(cap.limit, 2);
        assert_eq!(cap.stage, "render");
        assert_eq!(debug.filtered_count, 4);
        assert_eq!(debug.rendered_count, 2);
        assert_count_invariant(&result);
    }

    #[test]
    fn test_dictionary_miss() {
        let db = sample_db();
        let result = query_rhymes(Some(&db), &QueryRequest::new("orange", [Mode::Caret]));
        assert!(result.words(Mode::Caret).is_empty());
        let debug = &result.debug[&Mode::Caret];
        assert_eq!(debug.pool_count, 0);
        assert_eq!(debug.rejections[REJECT_NOT_FOUND], 1);
    }

    #[test]
    fn test_candidate_filters() {
        let db = RhymeDatabase::from_json(
            r#"{"version": 2,
                "words": {"night": "AY T"},
                "rhymes": {"AY T": ["Night", "light", "LIGHT", "sight(1)", "x-ray", "brrr", "kite"]}}"#,
            2,
        )
        .unwrap();
        let result = query_rhymes(Some(&db), &QueryRequest::new("night", [Mode::Caret]));
        assert_eq!(result.words(Mode::Caret), ["light", "sight", "kite"]);

        let debug = &result.debug[&Mode::Caret];
        assert_eq!(debug.pool_count, 7);
        assert_eq!(debug.rejections[REJECT_INVALID_CANDIDATE], 2);
        assert_eq!(debug.rejections[REJECT_DUPLICATE], 1);
        assert_eq!(debug.rejections[REJECT_SELF_MATCH], 1);
        assert_eq!(debug.stage_counts["shape"], 5);
        assert_eq!(debug.stage_counts["dedupe"], 4);
        assert_count_invariant(&result);
    }

    #[test]
    fn test_fallback_without_database() {
        let request = QueryRequest::new("mate", [Mode::Caret]).with_debounce(120);
        let result = query_rhymes(None, &request);
        let words = result.words(Mode::Caret);
        assert!(words.contains(&"fate".to_string()));
        assert!(!words.contains(&"mate".to_string()));

        let debug = &result.debug[&Mode::Caret];
        assert_eq!(debug.source, "fallback");
        assert_eq!(debug.rejections[REJECT_SELF_MATCH], 1);
        assert_eq!(debug.meta.as_ref().unwrap().debounce_ms, Some(120));
        assert_count_invariant(&result);
    }

    #[test]
    fn test_no_active_modes() {
        let result = query_rhymes(None, &QueryRequest::new("mate", []));
        assert!(result.results.is_empty());
        assert!(result.debug.is_empty());
    }
}
