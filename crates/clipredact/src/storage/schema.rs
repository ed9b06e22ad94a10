//! `SQLite` schema definitions for clipredact.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// Single-row table holding the scalar rule set settings.
pub const CREATE_RULE_SET_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS rule_set (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    polling_interval_ms INTEGER NOT NULL,
    notify_on_change INTEGER NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// One row per built-in category.
pub const CREATE_CATEGORY_RULES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS category_rules (
    category TEXT PRIMARY KEY,
    enabled INTEGER NOT NULL,
    pattern TEXT NOT NULL DEFAULT '',
    replacement TEXT NOT NULL
)
";

/// User-defined exact-match rules, kept in `position` order.
pub const CREATE_EXACT_MATCH_RULES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS exact_match_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    position INTEGER NOT NULL,
    name TEXT NOT NULL UNIQUE,
    pattern TEXT NOT NULL,
    enabled INTEGER NOT NULL,
    replacement TEXT NOT NULL
)
";

/// One row per redaction performed by the monitor.
pub const CREATE_AUDIT_LOG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    original_text TEXT NOT NULL,
    filtered_text TEXT NOT NULL,
    detections TEXT NOT NULL
)
";

/// Index on the audit timestamp for paging. Added by migration 2.
pub const CREATE_AUDIT_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_RULE_SET_TABLE,
    CREATE_CATEGORY_RULES_TABLE,
    CREATE_EXACT_MATCH_RULES_TABLE,
    CREATE_AUDIT_LOG_TABLE,
    CREATE_METADATA_TABLE,
];
