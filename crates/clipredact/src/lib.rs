//! `clipredact` - Keep sensitive data out of the clipboard
//!
//! This library provides the redaction engine, rule management, audit storage
//! and the clipboard monitor loop behind the `clipredact` binary.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod redaction;
pub mod rules;
pub mod storage;

pub use clipboard::SystemClipboard;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use monitor::{AuditSink, Monitor, MonitorHandle, PollOutcome, TextSource};
pub use redaction::{Category, PatternCache, RedactionOutcome, Redactor};
pub use rules::{ConfigManager, RuleSet, RuleStore, RuleWatcher};
pub use storage::{AuditEntry, AuditPage, Storage};
