//! The redaction engine.
//!
//! Categories are applied one after another to a working copy of the text,
//! in [`Category::ALL`] order, each pass seeing the output of the previous
//! one. Exact-match rules run afterwards in rule-set order.

use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use super::cache::PatternCache;
use super::matcher::CompiledMatcher;
use super::patterns::Category;
use super::source::PatternSource;
use crate::rules::RuleSet;

/// One replacement made during a redaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementRecord {
    /// Category name or exact-match rule name.
    pub name: String,

    /// The substring that was replaced.
    pub original: String,

    /// The text written in its place.
    pub replacement: String,
}

/// Ordered record of every replacement made by one redaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReplacementSummary {
    records: Vec<ReplacementRecord>,
}

impl ReplacementSummary {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing was replaced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, ReplacementRecord> {
        self.records.iter()
    }

    /// The name of each record, one per replacement.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    /// Consume the summary, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<ReplacementRecord> {
        self.records
    }

    fn push(&mut self, name: &str, original: &str, replacement: &str) {
        self.records.push(ReplacementRecord {
            name: name.to_string(),
            original: original.to_string(),
            replacement: replacement.to_string(),
        });
    }
}

impl<'a> IntoIterator for &'a ReplacementSummary {
    type Item = &'a ReplacementRecord;
    type IntoIter = std::slice::Iter<'a, ReplacementRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Result of redacting one piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactionOutcome {
    /// The rewritten text.
    pub text: String,

    /// Whether `text` differs from the input.
    pub changed: bool,

    /// What was replaced, in discovery order.
    pub summary: ReplacementSummary,
}

/// Applies a [`RuleSet`] to text.
#[derive(Debug)]
pub struct Redactor {
    source: PatternSource,
}

impl Redactor {
    /// Create a redactor that compiles overrides into `cache`.
    #[must_use]
    pub fn new(cache: Arc<PatternCache>) -> Self {
        Self {
            source: PatternSource::new(cache),
        }
    }

    /// The pattern source used for category lookups.
    #[must_use]
    pub fn source(&self) -> &PatternSource {
        &self.source
    }

    /// Redact `text` according to `rules`.
    #[must_use]
    pub fn redact(&self, text: &str, rules: &RuleSet) -> RedactionOutcome {
        let mut working = text.to_string();
        let mut summary = ReplacementSummary::default();

        for category in Category::ALL {
            let Some(rule) = rules.category(category).filter(|r| r.enabled) else {
                continue;
            };
            let matcher = self.source.resolve(category, rules);
            working = apply(
                &matcher,
                category.name(),
                &working,
                &rule.replacement,
                &mut summary,
                true,
            );
        }

        for rule in rules.exact_rules.iter().filter(|r| r.enabled) {
            let matcher = CompiledMatcher::literal(rule.name.as_str(), rule.pattern.as_str());
            working = apply(
                &matcher,
                &rule.name,
                &working,
                &rule.replacement,
                &mut summary,
                false,
            );
        }

        let changed = working != text;
        trace!(replacements = summary.len(), changed, "Redaction complete");

        RedactionOutcome {
            text: working,
            changed,
            summary,
        }
    }
}

/// Run one matcher over `working`. Regex passes record every match; literal
/// passes record a single entry for the rule no matter how many occurrences
/// were replaced.
fn apply(
    matcher: &CompiledMatcher,
    name: &str,
    working: &str,
    replacement: &str,
    summary: &mut ReplacementSummary,
    per_match: bool,
) -> String {
    let (rewritten, matched) = matcher.replace_all(working, replacement);
    if per_match {
        for original in &matched {
            summary.push(name, original, replacement);
        }
    } else if let Some(first) = matched.first() {
        summary.push(name, first, replacement);
    }
    if !matched.is_empty() {
        trace!(name, count = matched.len(), "Replaced matches");
    }
    rewritten
}
