//! Sensitive-data detection and redaction.
//!
//! This module provides:
//! - [`Category`] and the static [`CATEGORIES`] table of built-in detectors
//! - [`CompiledMatcher`], the regex or literal matcher used by every pass
//! - [`PatternCache`], a thread-safe cache of compiled override patterns
//! - [`PatternSource`], which resolves overrides and falls back to defaults
//! - [`Redactor`], which applies a rule set to text

mod cache;
mod engine;
mod matcher;
mod patterns;
mod source;

pub use cache::PatternCache;
pub use engine::{RedactionOutcome, Redactor, ReplacementRecord, ReplacementSummary};
pub use matcher::CompiledMatcher;
pub use patterns::{Category, CategoryDescriptor, CATEGORIES};
pub use source::PatternSource;
