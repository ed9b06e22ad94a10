//! Compiled-pattern cache.
//!
//! Override patterns are compiled once per distinct (key, pattern) pair and
//! shared between every redaction call that needs them. The cache is an
//! ordinary value; whoever builds the redaction engine owns it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use regex::Regex;
use tracing::{debug, warn};

use super::matcher::CompiledMatcher;
use crate::error::{Error, Result};

/// Outcome of compiling one pattern, failures included, so a bad pattern is
/// not recompiled on every poll.
#[derive(Debug, Clone)]
enum CacheEntry {
    Compiled(Arc<CompiledMatcher>),
    Invalid(regex::Error),
}

type EntryMap = HashMap<String, HashMap<String, CacheEntry>>;

/// A thread-safe cache of compiled matchers keyed by (key, pattern text).
///
/// Entries are never evicted individually; [`PatternCache::clear`] drops
/// them all.
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: RwLock<EntryMap>,
}

impl PatternCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the compiled matcher for `pattern` under `key`, compiling it on
    /// first use.
    ///
    /// Two callers racing on a new key may both compile; the first insert
    /// wins and both receive that instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` cannot be compiled.
    pub fn get(&self, key: &str, pattern: &str) -> Result<Arc<CompiledMatcher>> {
        let cached = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|patterns| patterns.get(pattern))
            .cloned();

        let entry = match cached {
            Some(entry) => entry,
            None => self.compile_and_insert(key, pattern),
        };

        match entry {
            CacheEntry::Compiled(matcher) => Ok(matcher),
            CacheEntry::Invalid(source) => Err(Error::InvalidPattern {
                key: key.to_string(),
                pattern: pattern.to_string(),
                source,
            }),
        }
    }

    fn compile_and_insert(&self, key: &str, pattern: &str) -> CacheEntry {
        let compiled = match Regex::new(pattern) {
            Ok(regex) => {
                debug!(key, "Compiled override pattern");
                CacheEntry::Compiled(Arc::new(CompiledMatcher::from_regex(key, regex)))
            }
            Err(source) => {
                warn!(key, pattern, error = %source, "Invalid override pattern");
                CacheEntry::Invalid(source)
            }
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(key.to_string())
            .or_default()
            .entry(pattern.to_string())
            .or_insert(compiled)
            .clone()
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let count: usize = entries.values().map(HashMap::len).sum();
        entries.clear();
        debug!(count, "Cleared pattern cache");
    }

    /// Number of cached entries, invalid patterns included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Check if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_compiles_and_caches() {
        let cache = PatternCache::new();

        let first = cache.get("test1", r"\d+").unwrap();
        let second = cache.get("test1", r"\d+").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other = cache.get("test2", "[a-z]+").unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_distinct_pattern_same_key_is_a_miss() {
        let cache = PatternCache::new();

        let digits = cache.get("email", r"\d+").unwrap();
        let letters = cache.get("email", "[a-z]+").unwrap();
        assert!(!Arc::ptr_eq(&digits, &letters));
        assert_eq!(letters.pattern(), "[a-z]+");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_same_pattern_different_key_is_a_miss() {
        let cache = PatternCache::new();

        let a = cache.get("email", r"\d+").unwrap();
        let b = cache.get("phone", r"\d+").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.key(), "phone");
    }

    #[test]
    fn test_invalid_pattern() {
        let cache = PatternCache::new();

        let result = cache.get("invalid", "[invalid");
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));

        // The failure is remembered and reported again.
        let result = cache.get("invalid", "[invalid");
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = PatternCache::new();
        cache.get("test1", r"\d+").unwrap();
        cache.get("test2", "[a-z]+").unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());

        // Entries are recompiled after a clear.
        let again = cache.get("test1", r"\d+").unwrap();
        assert_eq!(again.pattern(), r"\d+");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_access_converges() {
        let cache = Arc::new(PatternCache::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get("shared", r"\b\w+@\w+\.com\b").unwrap())
            })
            .collect();

        let matchers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let retained = cache.get("shared", r"\b\w+@\w+\.com\b").unwrap();

        assert_eq!(cache.len(), 1);
        for matcher in &matchers {
            assert!(Arc::ptr_eq(matcher, &retained));
        }
    }

    #[test]
    fn test_concurrent_mixed_keys() {
        let cache = Arc::new(PatternCache::new());

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let key = format!("key{}", i % 3);
                        assert!(cache.get(&key, r"\d+").is_ok());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 3);
    }
}
