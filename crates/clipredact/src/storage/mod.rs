//! Storage layer for clipredact.
//!
//! This module provides `SQLite`-based persistent storage for the rule set
//! and for the audit log of redactions performed by the monitor.

pub mod migrations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::monitor::AuditSink;
use crate::redaction::Category;
use crate::rules::{CategoryRule, ExactMatchRule, RuleSet, RuleStore};

/// Page size used when a caller asks for zero entries per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Storage engine for rules and audit entries.
///
/// The connection sits behind a mutex so one `Storage` can be shared between
/// the monitor task and the configuration manager.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Audit entries kept after each insert; 0 keeps everything.
    max_audit_entries: usize,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
            max_audit_entries: 0,
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
            max_audit_entries: 0,
        })
    }

    /// Keep at most `max` audit entries, pruning the oldest after each
    /// insert. 0 disables pruning.
    #[must_use]
    pub fn with_max_audit_entries(mut self, max: usize) -> Self {
        self.max_audit_entries = max;
        self
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one redaction to the audit log.
    ///
    /// `detections` holds one name per replacement made.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_audit_entry(
        &self,
        original: &str,
        filtered: &str,
        detections: &[String],
    ) -> Result<i64> {
        let detections = serde_json::to_string(detections)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let id = {
            let conn = self.conn();
            conn.execute(
                r"
                INSERT INTO audit_log (timestamp, original_text, filtered_text, detections)
                VALUES (?1, ?2, ?3, ?4)
                ",
                params![timestamp, original, filtered, detections],
            )?;
            conn.last_insert_rowid()
        };
        debug!("Inserted audit entry with id {}", id);

        if self.max_audit_entries > 0 {
            self.prune_audit_keep_recent(self.max_audit_entries)?;
        }
        Ok(id)
    }

    /// Get one page of audit entries, newest first.
    ///
    /// Pages are numbered from 1; page 0 is treated as page 1 and a page
    /// size of 0 as [`DEFAULT_PAGE_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audit_entries(&self, page: usize, page_size: usize) -> Result<AuditPage> {
        let page = page.max(1);
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        let offset = (page - 1).saturating_mul(page_size);

        let total_count = self.audit_count()?;

        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT id, timestamp, original_text, filtered_text, detections
            FROM audit_log ORDER BY timestamp DESC, id DESC LIMIT ?1 OFFSET ?2
            ",
        )?;

        let limit_i64 = i64::try_from(page_size).unwrap_or(i64::MAX);
        let offset_i64 = i64::try_from(offset).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map([limit_i64, offset_i64], Self::row_to_audit_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total_pages = total_count.div_ceil(u64::try_from(page_size).unwrap_or(u64::MAX));
        Ok(AuditPage {
            entries,
            page,
            page_size,
            total_count,
            total_pages,
        })
    }

    /// Count audit entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audit_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Delete every audit entry. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear_audit_log(&self) -> Result<usize> {
        let affected = self.conn().execute("DELETE FROM audit_log", [])?;
        info!("Cleared {} audit entries", affected);
        Ok(affected)
    }

    /// Prune the audit log to keep only the most recent N entries.
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_audit_keep_recent(&self, keep_count: usize) -> Result<usize> {
        let keep_i64 = i64::try_from(keep_count).unwrap_or(i64::MAX);
        let affected = self.conn().execute(
            r"
            DELETE FROM audit_log WHERE id NOT IN (
                SELECT id FROM audit_log ORDER BY timestamp DESC, id DESC LIMIT ?1
            )
            ",
            [keep_i64],
        )?;

        if affected > 0 {
            info!("Pruned {} audit entries to keep {} recent", affected, keep_count);
        }
        Ok(affected)
    }

    fn row_to_audit_entry(row: &rusqlite::Row) -> rusqlite::Result<AuditEntry> {
        let id: i64 = row.get(0)?;
        let timestamp_str: String = row.get(1)?;
        let original_text: String = row.get(2)?;
        let filtered_text: String = row.get(3)?;
        let detections_json: String = row.get(4)?;

        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        let detections = serde_json::from_str(&detections_json).unwrap_or_else(|e| {
            warn!(id, error = %e, "Unreadable detections list in audit entry");
            Vec::new()
        });

        Ok(AuditEntry {
            id,
            timestamp,
            original_text,
            filtered_text,
            detections,
        })
    }

    fn load_exact_rules(conn: &Connection) -> Result<Vec<ExactMatchRule>> {
        let mut stmt = conn.prepare(
            r"
            SELECT name, pattern, enabled, replacement
            FROM exact_match_rules ORDER BY position ASC, id ASC
            ",
        )?;

        let rules = stmt
            .query_map([], |row| {
                Ok(ExactMatchRule {
                    name: row.get(0)?,
                    pattern: row.get(1)?,
                    enabled: row.get(2)?,
                    replacement: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    fn load_categories(conn: &Connection) -> Result<BTreeMap<Category, CategoryRule>> {
        let mut categories: BTreeMap<Category, CategoryRule> = Category::ALL
            .iter()
            .map(|&c| (c, CategoryRule::default_for(c)))
            .collect();

        let mut stmt =
            conn.prepare("SELECT category, enabled, pattern, replacement FROM category_rules")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    CategoryRule {
                        enabled: row.get(1)?,
                        pattern: row.get(2)?,
                        replacement: row.get(3)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (name, rule) in rows {
            match name.parse::<Category>() {
                Ok(category) if rule == CategoryRule::default() => {
                    categories.remove(&category);
                }
                Ok(category) => {
                    categories.insert(category, rule);
                }
                Err(_) => debug!(category = %name, "Ignoring unknown category row"),
            }
        }
        Ok(categories)
    }
}

impl RuleStore for Storage {
    fn load_rule_set(&self) -> Result<RuleSet> {
        let conn = self.conn();

        let settings: Option<(i64, bool)> = conn
            .query_row(
                "SELECT polling_interval_ms, notify_on_change FROM rule_set WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((interval, notify_on_change)) = settings else {
            return Err(Error::RuleSetNotFound);
        };

        let polling_interval_ms = u64::try_from(interval)
            .ok()
            .filter(|&ms| ms > 0)
            .ok_or_else(|| {
                Error::corrupt_rule_set(format!(
                    "polling interval must be positive, found {interval}"
                ))
            })?;

        Ok(RuleSet {
            categories: Self::load_categories(&conn)?,
            exact_rules: Self::load_exact_rules(&conn)?,
            polling_interval_ms,
            notify_on_change,
        })
    }

    fn save_rule_set(&self, rules: &RuleSet) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            r"
            INSERT INTO rule_set (id, polling_interval_ms, notify_on_change, updated_at)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                polling_interval_ms = excluded.polling_interval_ms,
                notify_on_change = excluded.notify_on_change,
                updated_at = excluded.updated_at
            ",
            params![
                i64::try_from(rules.polling_interval_ms).unwrap_or(i64::MAX),
                rules.notify_on_change,
                Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            ],
        )?;

        // Every built-in category gets a row, so an absent category is
        // stored as disabled rather than reverting to its default. Such rows
        // load back as absent.
        tx.execute("DELETE FROM category_rules", [])?;
        for category in Category::ALL {
            let rule = rules.category(category).cloned().unwrap_or_default();
            tx.execute(
                r"
                INSERT INTO category_rules (category, enabled, pattern, replacement)
                VALUES (?1, ?2, ?3, ?4)
                ",
                params![category.name(), rule.enabled, rule.pattern, rule.replacement],
            )?;
        }

        tx.execute("DELETE FROM exact_match_rules", [])?;
        for (position, rule) in rules.exact_rules.iter().enumerate() {
            tx.execute(
                r"
                INSERT INTO exact_match_rules (position, name, pattern, enabled, replacement)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
                params![
                    i64::try_from(position).unwrap_or(i64::MAX),
                    rule.name,
                    rule.pattern,
                    rule.enabled,
                    rule.replacement,
                ],
            )?;
        }

        tx.commit()?;
        debug!(exact_rules = rules.exact_rules.len(), "Saved rule set");
        Ok(())
    }

    fn revision(&self) -> Result<Option<String>> {
        let updated_at = self
            .conn()
            .query_row("SELECT updated_at FROM rule_set WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(updated_at)
    }
}

impl AuditSink for Storage {
    fn record(&self, original: &str, filtered: &str, detections: &[String]) -> Result<()> {
        self.insert_audit_entry(original, filtered, detections)
            .map(|_| ())
            .map_err(|e| Error::audit_sink(e.to_string()))
    }
}

/// One logged redaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// Row identifier.
    pub id: i64,
    /// When the redaction happened.
    pub timestamp: DateTime<Utc>,
    /// The text as read from the source.
    pub original_text: String,
    /// The text written back.
    pub filtered_text: String,
    /// One category or rule name per replacement.
    pub detections: Vec<String>,
}

/// One page of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditPage {
    /// Entries on this page, newest first.
    pub entries: Vec<AuditEntry>,
    /// 1-based page number.
    pub page: usize,
    /// Requested entries per page.
    pub page_size: usize,
    /// Entries in the whole log.
    pub total_count: u64,
    /// Pages needed to show the whole log.
    pub total_pages: u64,
}
