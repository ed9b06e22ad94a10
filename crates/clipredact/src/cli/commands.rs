//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::error::{Error, Result};
use crate::redaction::Category;
use crate::rules::{CategoryRule, ExactMatchRule, RuleSet};

/// Run command arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Do not write redactions to the audit log
    #[arg(long)]
    pub no_audit: bool,
}

/// Scan command arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Text to scan (reads stdin when omitted)
    pub text: Option<String>,

    /// Output the redacted text and replacement summary as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Rule management commands.
#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// Show the current rule set
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Enable detection for a category
    Enable {
        /// The category to enable
        #[arg(value_enum)]
        category: Category,
    },

    /// Disable detection for a category
    Disable {
        /// The category to disable
        #[arg(value_enum)]
        category: Category,
    },

    /// Set the override pattern for a category (empty string restores the default)
    Pattern {
        /// The category to change
        #[arg(value_enum)]
        category: Category,

        /// Regular expression to use instead of the built-in one
        pattern: String,
    },

    /// Set the replacement text for a category
    Replacement {
        /// The category to change
        #[arg(value_enum)]
        category: Category,

        /// Text written in place of each match
        text: String,
    },

    /// Add or replace an exact-match rule
    AddExact {
        /// Rule name, reported in the audit log
        name: String,

        /// Exact text to look for (case-sensitive)
        text: String,

        /// Text written in place of every occurrence
        replacement: String,

        /// Add the rule disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Remove an exact-match rule
    RemoveExact {
        /// Name of the rule to remove
        name: String,
    },

    /// Set the polling interval in milliseconds
    Interval {
        /// Milliseconds between clipboard checks
        ms: u64,
    },

    /// Turn logging of each redaction on or off
    Notify {
        /// New state
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Restore the default rule set
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl RulesCommand {
    /// The rule set this command produces from `current`, or `None` for
    /// commands that do not edit a single rule (`show`, `reset`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the edit refers to a missing
    /// rule or produces an invalid rule set.
    pub fn edited(&self, current: &RuleSet) -> Result<Option<RuleSet>> {
        let rules = current.clone();
        let edited = match self {
            Self::Show { .. } | Self::Reset { .. } => return Ok(None),
            Self::Enable { category } => set_enabled(rules, *category, true),
            Self::Disable { category } => set_enabled(rules, *category, false),
            Self::Pattern { category, pattern } => {
                let category = *category;
                let rule = CategoryRule {
                    pattern: pattern.clone(),
                    ..category_rule(&rules, category)
                };
                rules.with_category(category, rule)
            }
            Self::Replacement { category, text } => {
                let category = *category;
                let rule = CategoryRule {
                    replacement: text.clone(),
                    ..category_rule(&rules, category)
                };
                rules.with_category(category, rule)
            }
            Self::AddExact {
                name,
                text,
                replacement,
                disabled,
            } => rules.with_exact_rule(
                ExactMatchRule::new(name.as_str(), text.as_str(), replacement.as_str())
                    .enabled(!disabled),
            ),
            Self::RemoveExact { name } => {
                if rules.exact_rule(name).is_none() {
                    return Err(Error::ConfigValidation {
                        message: format!("no exact-match rule named '{name}'"),
                    });
                }
                rules.without_exact_rule(name)
            }
            Self::Interval { ms } => RuleSet {
                polling_interval_ms: *ms,
                ..rules
            },
            Self::Notify { state } => RuleSet {
                notify_on_change: matches!(state, Toggle::On),
                ..rules
            },
        };

        edited.validate()?;
        Ok(Some(edited))
    }
}

fn category_rule(rules: &RuleSet, category: Category) -> CategoryRule {
    rules
        .category(category)
        .cloned()
        .unwrap_or_else(|| CategoryRule::default_for(category))
}

fn set_enabled(rules: RuleSet, category: Category, enabled: bool) -> RuleSet {
    let rule = CategoryRule {
        enabled,
        ..category_rule(&rules, category)
    };
    rules.with_category(category, rule)
}

/// Audit log commands.
#[derive(Debug, Subcommand)]
pub enum LogsCommand {
    /// List logged redactions, newest first
    List {
        /// Page number, starting at 1
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Entries per page
        #[arg(short = 's', long, default_value = "20")]
        page_size: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete every logged redaction
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Keep only the most recent entries
    Prune {
        /// Number of entries to keep
        #[arg(short, long)]
        keep: usize,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// On/off switch argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    /// Enabled
    On,
    /// Disabled
    Off,
}
