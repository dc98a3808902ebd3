//! Store Error Types
//!
//! This module defines the typed error taxonomy for the persistence layer,
//! covering connection lifecycle, schema upgrade, and per-operation
//! failures.
//!
//! Not-found is deliberately not an error here: lookups return
//! `Ok(None)` / `Ok(false)` and callers decide whether absence is fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Persistence layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Operation issued before `DatabaseService::open` completed, or after
    /// `close()`
    #[error("Store is not connected")]
    NotConnected,

    /// Another open connection prevented the schema upgrade; the caller
    /// should prompt the user to close other sessions and retry
    #[error("Schema upgrade blocked by another connection: {context}")]
    Blocked { context: String },

    /// The migration transaction aborted; the on-disk layout was rolled
    /// back to its previous version
    #[error("Schema upgrade from v{from} to v{to} failed: {context}")]
    UpgradeFailed {
        from: i64,
        to: i64,
        context: String,
    },

    /// The engine aborted a transaction mid-operation; retryable
    #[error("Transaction aborted: {context}")]
    TransactionAborted { context: String },

    /// Storage quota exhausted; not retryable without user action
    #[error("Storage quota exceeded: {context}")]
    QuotaExceeded { context: String },

    /// Failed to create the database's parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// Failed to establish the database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Row data that could not be decoded into a model
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    Sql { context: String },
}

impl StoreError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create a blocked-upgrade error
    pub fn blocked(context: impl Into<String>) -> Self {
        Self::Blocked {
            context: context.into(),
        }
    }

    /// Create an upgrade failed error
    pub fn upgrade_failed(from: i64, to: i64, context: impl Into<String>) -> Self {
        Self::UpgradeFailed {
            from,
            to,
            context: context.into(),
        }
    }

    /// Create a transaction aborted error
    pub fn transaction_aborted(context: impl Into<String>) -> Self {
        Self::TransactionAborted {
            context: context.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Classify a libsql error raised while executing `context`.
    ///
    /// Lock contention and quota exhaustion get their own variants so
    /// callers can distinguish retryable from user-actionable failures;
    /// everything else is a context-carrying SQL error.
    pub fn from_sql(context: impl Into<String>, source: libsql::Error) -> Self {
        let context = format!("{}: {}", context.into(), source);
        let lowered = context.to_lowercase();

        if lowered.contains("database is locked") || lowered.contains("database is busy") {
            Self::TransactionAborted { context }
        } else if lowered.contains("disk is full") || lowered.contains("database or disk is full")
        {
            Self::QuotaExceeded { context }
        } else {
            Self::Sql { context }
        }
    }

    /// Whether retrying the same operation may succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionAborted { .. })
    }
}
