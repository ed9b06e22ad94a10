//! Compiled matchers.
//!
//! A [`CompiledMatcher`] is an immutable, ready-to-use matcher built from a
//! pattern string: either a regular expression or an exact literal.

use regex::Regex;

use crate::error::{Error, Result};

#[derive(Debug)]
enum MatcherKind {
    Regex(Regex),
    Literal,
}

/// An opaque compiled matcher tied to one (key, pattern) pair.
#[derive(Debug)]
pub struct CompiledMatcher {
    key: String,
    pattern: String,
    kind: MatcherKind,
}

impl CompiledMatcher {
    /// Compile a regular expression matcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` is not a valid regex.
    pub fn regex(key: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let pattern = pattern.into();
        match Regex::new(&pattern) {
            Ok(regex) => Ok(Self {
                key,
                pattern,
                kind: MatcherKind::Regex(regex),
            }),
            Err(source) => Err(Error::InvalidPattern {
                key,
                pattern,
                source,
            }),
        }
    }

    /// Wrap an already compiled regex.
    pub(crate) fn from_regex(key: impl Into<String>, regex: Regex) -> Self {
        Self {
            key: key.into(),
            pattern: regex.as_str().to_string(),
            kind: MatcherKind::Regex(regex),
        }
    }

    /// Build a matcher for an exact substring.
    #[must_use]
    pub fn literal(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pattern: text.into(),
            kind: MatcherKind::Literal,
        }
    }

    /// The key this matcher was built for.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The source pattern text.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether this matcher is an exact literal.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, MatcherKind::Literal)
    }

    /// Check if the content contains at least one non-empty match.
    #[must_use]
    pub fn is_match(&self, content: &str) -> bool {
        match &self.kind {
            MatcherKind::Regex(regex) => regex.find_iter(content).any(|m| !m.is_empty()),
            MatcherKind::Literal => !self.pattern.is_empty() && content.contains(&self.pattern),
        }
    }

    /// Byte ranges of all non-overlapping, non-empty matches, left to right.
    #[must_use]
    pub fn find_all(&self, content: &str) -> Vec<(usize, usize)> {
        match &self.kind {
            MatcherKind::Regex(regex) => regex
                .find_iter(content)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
            MatcherKind::Literal if self.pattern.is_empty() => Vec::new(),
            MatcherKind::Literal => content
                .match_indices(self.pattern.as_str())
                .map(|(start, s)| (start, start + s.len()))
                .collect(),
        }
    }

    /// Replace every match in the content with `replacement`, verbatim.
    ///
    /// Returns the rewritten text together with the matched substrings in
    /// the order they occurred.
    #[must_use]
    pub fn replace_all<'a>(&self, content: &'a str, replacement: &str) -> (String, Vec<&'a str>) {
        let ranges = self.find_all(content);
        if ranges.is_empty() {
            return (content.to_string(), Vec::new());
        }

        let mut output = String::with_capacity(content.len());
        let mut matched = Vec::with_capacity(ranges.len());
        let mut last = 0;
        for (start, end) in ranges {
            output.push_str(&content[last..start]);
            output.push_str(replacement);
            matched.push(&content[start..end]);
            last = end;
        }
        output.push_str(&content[last..]);
        (output, matched)
    }
}
