//! Detection rules.
//!
//! A [`RuleSet`] is a complete snapshot of detection policy: which built-in
//! categories are enabled, their override patterns and placeholders, the
//! user's exact-match rules, and the monitor settings. Rule sets are plain
//! values; the [`ConfigManager`] hands them out behind an `Arc` and replaces
//! them wholesale.

mod manager;
mod watch;

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::redaction::Category;

pub use manager::{ConfigManager, RuleObserver, RuleStore};
pub use watch::RuleWatcher;

/// Default polling interval in milliseconds.
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 500;

/// Per-category policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRule {
    /// Whether the category is detected at all.
    pub enabled: bool,

    /// Override regex. Empty means "use the built-in default".
    pub pattern: String,

    /// Placeholder written in place of each match.
    pub replacement: String,
}

impl CategoryRule {
    /// The default rule for a category: enabled, no override, default
    /// placeholder.
    #[must_use]
    pub fn default_for(category: Category) -> Self {
        Self {
            enabled: true,
            pattern: String::new(),
            replacement: category.descriptor().default_replacement.to_string(),
        }
    }

    /// Whether an override pattern is configured.
    #[must_use]
    pub fn has_override(&self) -> bool {
        !self.pattern.is_empty()
    }
}

impl Default for CategoryRule {
    fn default() -> Self {
        Self {
            enabled: false,
            pattern: String::new(),
            replacement: String::new(),
        }
    }
}

/// A user-defined literal-substring rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactMatchRule {
    /// Identifier reported in replacement summaries.
    pub name: String,

    /// The exact text to look for (case-sensitive, not a regex).
    pub pattern: String,

    /// Whether this rule is applied.
    pub enabled: bool,

    /// Text written in place of every occurrence.
    pub replacement: String,
}

impl ExactMatchRule {
    /// Create an enabled rule.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            enabled: true,
            replacement: replacement.into(),
        }
    }

    /// Return a copy with the enabled flag set.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A complete detection and replacement policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Per-category policy. A category missing from the map is disabled.
    pub categories: BTreeMap<Category, CategoryRule>,

    /// Exact-match rules, applied in list order after all categories.
    pub exact_rules: Vec<ExactMatchRule>,

    /// Monitor polling interval in milliseconds.
    pub polling_interval_ms: u64,

    /// Log each redaction as it happens.
    pub notify_on_change: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            categories: Category::ALL
                .iter()
                .map(|&c| (c, CategoryRule::default_for(c)))
                .collect(),
            exact_rules: Vec::new(),
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            notify_on_change: true,
        }
    }
}

impl RuleSet {
    /// A rule set with every category disabled and no exact rules.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            categories: BTreeMap::new(),
            ..Self::default()
        }
    }

    /// The rule for a category, if one is configured.
    #[must_use]
    pub fn category(&self, category: Category) -> Option<&CategoryRule> {
        self.categories.get(&category)
    }

    /// Whether a category is enabled.
    #[must_use]
    pub fn is_enabled(&self, category: Category) -> bool {
        self.category(category).is_some_and(|r| r.enabled)
    }

    /// The override pattern for a category, or `""` if none.
    #[must_use]
    pub fn override_pattern(&self, category: Category) -> &str {
        self.category(category).map_or("", |r| r.pattern.as_str())
    }

    /// The placeholder for a category, or `""` if none.
    #[must_use]
    pub fn replacement(&self, category: Category) -> &str {
        self.category(category).map_or("", |r| r.replacement.as_str())
    }

    /// The polling interval as a Duration.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Find an exact-match rule by name.
    #[must_use]
    pub fn exact_rule(&self, name: &str) -> Option<&ExactMatchRule> {
        self.exact_rules.iter().find(|r| r.name == name)
    }

    /// Return a copy with `rule` set for `category`.
    ///
    /// [`CategoryRule::default`] (disabled, nothing configured) removes the
    /// category from the map instead, which has the same effect.
    #[must_use]
    pub fn with_category(mut self, category: Category, rule: CategoryRule) -> Self {
        if rule == CategoryRule::default() {
            self.categories.remove(&category);
        } else {
            self.categories.insert(category, rule);
        }
        self
    }

    /// Return a copy with `rule` added, replacing any rule of the same name
    /// in place.
    #[must_use]
    pub fn with_exact_rule(mut self, rule: ExactMatchRule) -> Self {
        match self.exact_rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.exact_rules.push(rule),
        }
        self
    }

    /// Return a copy without the exact rule named `name`.
    #[must_use]
    pub fn without_exact_rule(mut self, name: &str) -> Self {
        self.exact_rules.retain(|r| r.name != name);
        self
    }

    /// Validate field shapes.
    ///
    /// Pattern compilability is not checked here; invalid overrides fall back
    /// to the built-in default at redaction time.
    ///
    /// # Errors
    ///
    /// Returns an error if the polling interval is zero or the exact-match
    /// rules have empty or duplicate names, or empty texts.
    pub fn validate(&self) -> Result<()> {
        if self.polling_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "polling_interval_ms must be greater than 0".to_string(),
            });
        }

        let mut names = HashSet::new();
        for rule in &self.exact_rules {
            if rule.name.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "exact-match rule name cannot be empty".to_string(),
                });
            }
            if rule.pattern.is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("exact-match rule '{}' has empty text", rule.name),
                });
            }
            if !names.insert(rule.name.as_str()) {
                return Err(Error::ConfigValidation {
                    message: format!("duplicate exact-match rule name: {}", rule.name),
                });
            }
        }

        Ok(())
    }
}
