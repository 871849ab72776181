use crate::types::{Mode, QueryRequest, QueryResult};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache identity of a request: the raw word each active mode queries, plus the cap.
/// Debounce is caller policy and does not change the answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    targets: Vec<(Mode, String)>,
    cap: Option<usize>,
}

impl CacheKey {
    pub fn for_request(request: &QueryRequest) -> Self {
        CacheKey {
            targets: request
                .active_modes
                .iter()
                .map(|&mode| (mode, request.target_for(mode).to_string()))
                .collect(),
            cap: request.cap,
        }
    }
}

/// LRU of results computed against the loaded dictionary
pub struct SuggestionCache {
    entries: Option<LruCache<CacheKey, QueryResult>>,
}

impl SuggestionCache {
    /// A capacity of 0 gives a cache that never stores anything
    pub fn new(capacity: usize) -> Self {
        SuggestionCache {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<QueryResult> {
        self.entries.as_mut()?.get(key).cloned()
    }

    pub fn put(&mut self, key: CacheKey, result: QueryResult) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(key, result);
        }
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(word: &str) -> QueryResult {
        let mut result = QueryResult::default();
        result.results.insert(Mode::Caret, vec![word.to_string()]);
        result
    }

    #[test]
    fn test_key_ignores_debounce() {
        let a = QueryRequest::new("time", [Mode::Caret]).with_debounce(100);
        let b = QueryRequest::new("time", [Mode::Caret]).with_debounce(300);
        assert_eq!(CacheKey::for_request(&a), CacheKey::for_request(&b));

        let c = QueryRequest::new("time", [Mode::Caret]).with_cap(3);
        assert_ne!(CacheKey::for_request(&a), CacheKey::for_request(&c));
    }

    #[test]
    fn test_key_uses_mode_targets() {
        let a = QueryRequest::new("", []).with_target(Mode::LineLast, "rhyme");
        let b = QueryRequest::new("rhyme", [Mode::LineLast]);
        assert_eq!(CacheKey::for_request(&a), CacheKey::for_request(&b));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = SuggestionCache::new(2);
        let keys: Vec<CacheKey> = ["a", "b", "c"]
            .iter()
            .map(|w| CacheKey::for_request(&QueryRequest::new(*w, [Mode::Caret])))
            .collect();
        cache.put(keys[0].clone(), result_with("a"));
        cache.put(keys[1].clone(), result_with("b"));
        assert!(cache.get(&keys[0]).is_some());
        cache.put(keys[2].clone(), result_with("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[1]).is_none());
        assert_eq!(cache.get(&keys[0]).unwrap().words(Mode::Caret), ["a"]);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut cache = SuggestionCache::new(0);
        let key = CacheKey::for_request(&QueryRequest::new("a", [Mode::Caret]));
        cache.put(key.clone(), result_with("a"));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }
}
