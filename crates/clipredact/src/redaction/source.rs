//! Pattern resolution with silent fallback.
//!
//! Each built-in category has a default matcher compiled once when the
//! [`PatternSource`] is built. A rule set may carry an override pattern for a
//! category; overrides go through the shared [`PatternCache`], and an
//! override that does not compile degrades to the default instead of
//! failing the redaction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::cache::PatternCache;
use super::matcher::CompiledMatcher;
use super::patterns::{Category, CATEGORIES};
use crate::rules::RuleSet;

/// Resolves the matcher to use for a category under a given rule set.
#[derive(Debug)]
pub struct PatternSource {
    defaults: Vec<Arc<CompiledMatcher>>,
    cache: Arc<PatternCache>,
    fallbacks: AtomicU64,
}

impl PatternSource {
    /// Build a pattern source backed by `cache`.
    ///
    /// # Panics
    ///
    /// Panics if a built-in default pattern is invalid.
    #[must_use]
    pub fn new(cache: Arc<PatternCache>) -> Self {
        let defaults = CATEGORIES
            .iter()
            .map(|d| {
                Arc::new(
                    CompiledMatcher::regex(d.name, d.default_pattern)
                        .expect("Invalid built-in pattern"),
                )
            })
            .collect();

        Self {
            defaults,
            cache,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// The matcher for `category` under `rules`.
    ///
    /// Returns the cached override matcher when the rule set carries a valid
    /// override, and the built-in default otherwise. Never fails.
    #[must_use]
    pub fn resolve(&self, category: Category, rules: &RuleSet) -> Arc<CompiledMatcher> {
        let pattern = rules.override_pattern(category);
        if pattern.is_empty() {
            return self.default_matcher(category);
        }

        match self.cache.get(category.name(), pattern) {
            Ok(matcher) => matcher,
            Err(err) => {
                let total = self.fallbacks.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    category = %category,
                    error = %err,
                    fallbacks = total,
                    "Override pattern unusable, using built-in default"
                );
                self.default_matcher(category)
            }
        }
    }

    /// The precompiled built-in matcher for `category`.
    #[must_use]
    pub fn default_matcher(&self, category: Category) -> Arc<CompiledMatcher> {
        Arc::clone(&self.defaults[category as usize])
    }

    /// How many times an override has been replaced by its default.
    #[must_use]
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// The cache override patterns are compiled into.
    #[must_use]
    pub fn cache(&self) -> &Arc<PatternCache> {
        &self.cache
    }
}
