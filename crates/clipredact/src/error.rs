//! Error types for clipredact.
//!
//! This module defines all error types used throughout the clipredact crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for clipredact operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Pattern Errors ===
    /// An override pattern could not be compiled.
    #[error("invalid pattern for '{key}' ({pattern}): {source}")]
    InvalidPattern {
        /// Cache key the pattern was requested under.
        key: String,
        /// The pattern text that failed to compile.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    // === Rule Persistence Errors ===
    /// Reading or writing the durable rule set failed.
    #[error("failed to {operation} rule set: {source}")]
    Persistence {
        /// The operation that failed ("load", "save", "reload").
        operation: &'static str,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// No rule set has been stored yet.
    #[error("no rule set found in storage")]
    RuleSetNotFound,

    /// The stored rule set could not be interpreted.
    #[error("stored rule set is corrupt: {message}")]
    CorruptRuleSet {
        /// Description of what is wrong with the stored data.
        message: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Text Source Errors ===
    /// Reading from the text source failed.
    #[error("failed to read text source: {message}")]
    TextSourceRead {
        /// Description of what went wrong.
        message: String,
    },

    /// Writing to the text source failed.
    #[error("failed to write text source: {message}")]
    TextSourceWrite {
        /// Description of what went wrong.
        message: String,
    },

    /// The audit sink rejected a record.
    #[error("audit sink error: {message}")]
    AuditSink {
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for clipredact operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Wrap a storage error as a rule persistence failure.
    #[must_use]
    pub fn persistence(operation: &'static str, source: Error) -> Self {
        Self::Persistence {
            operation,
            source: Box::new(source),
        }
    }

    /// Create a corrupt rule set error.
    #[must_use]
    pub fn corrupt_rule_set(message: impl Into<String>) -> Self {
        Self::CorruptRuleSet {
            message: message.into(),
        }
    }

    /// Create a text source read error.
    #[must_use]
    pub fn text_source_read(message: impl Into<String>) -> Self {
        Self::TextSourceRead {
            message: message.into(),
        }
    }

    /// Create a text source write error.
    #[must_use]
    pub fn text_source_write(message: impl Into<String>) -> Self {
        Self::TextSourceWrite {
            message: message.into(),
        }
    }

    /// Create an audit sink error.
    #[must_use]
    pub fn audit_sink(message: impl Into<String>) -> Self {
        Self::AuditSink {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a rule persistence failure.
    #[must_use]
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }

    /// Check if this error means the stored rule set is absent or unreadable,
    /// in which case the defaults should take its place.
    #[must_use]
    pub fn is_missing_or_corrupt(&self) -> bool {
        matches!(self, Self::RuleSetNotFound | Self::CorruptRuleSet { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RuleSetNotFound;
        assert_eq!(err.to_string(), "no rule set found in storage");

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_invalid_pattern_display() {
        let source = regex::Regex::new("[invalid").unwrap_err();
        let err = Error::InvalidPattern {
            key: "email".to_string(),
            pattern: "[invalid".to_string(),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("email"));
        assert!(msg.contains("[invalid"));
    }

    #[test]
    fn test_persistence_wraps_source() {
        let err = Error::persistence("save", Error::internal("disk full"));
        assert!(err.is_persistence_error());
        let msg = err.to_string();
        assert!(msg.contains("save"));
        assert!(msg.contains("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_is_missing_or_corrupt() {
        assert!(Error::RuleSetNotFound.is_missing_or_corrupt());
        assert!(Error::corrupt_rule_set("bad interval").is_missing_or_corrupt());
        assert!(!Error::internal("x").is_missing_or_corrupt());
        assert!(!Error::RuleSetNotFound.is_persistence_error());
    }

    #[test]
    fn test_text_source_errors_display() {
        let err = Error::text_source_read("clipboard locked");
        assert_eq!(
            err.to_string(),
            "failed to read text source: clipboard locked"
        );

        let err = Error::text_source_write("denied");
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_audit_sink_error_display() {
        let err = Error::audit_sink("table missing");
        assert!(err.to_string().contains("table missing"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid backoff".to_string(),
        };
        assert!(err.to_string().contains("invalid backoff"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
