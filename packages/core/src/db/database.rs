//! Database Connection Management
//!
//! This module provides the shared connection handle and schema-version
//! lifecycle for the Inkdeck store, built on libsql.
//!
//! # Architecture
//!
//! - **Explicitly owned handle**: `DatabaseService` is constructed by the
//!   application shell and injected (`Arc`-shared) into every component
//!   that touches the store; there is no module-level singleton.
//! - **Versioned layout**: opening at a target schema version runs the
//!   additive migration steps inside one upgrade transaction and stamps
//!   `PRAGMA user_version`.
//! - **WAL mode + busy timeout**: concurrent async operations wait and
//!   retry instead of failing immediately on lock contention.
//!
//! # Failure modes at open
//!
//! - [`StoreError::Blocked`]: another connection held the database lock
//!   during the upgrade; prompt the user to close other sessions and retry.
//! - [`StoreError::UpgradeFailed`]: the migration transaction aborted and
//!   was rolled back.
//!
//! Both leave no connected handle behind, so a subsequent `open` retries
//! cleanly.

use crate::db::error::StoreError;
use crate::db::migrations::{self, TARGET_SCHEMA_VERSION};
use libsql::{Builder, Connection, Database};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared connection handle for the Inkdeck store
///
/// # Examples
///
/// ```no_run
/// use inkdeck_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::open(PathBuf::from("./data/inkdeck.db")).await?;
///     assert_eq!(db.schema_version().await?, inkdeck_core::db::TARGET_SCHEMA_VERSION);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database (Arc-shared across components)
    db: Arc<Database>,

    /// Path to the database file
    db_path: PathBuf,

    /// Set by `close()`; operations afterwards fail with `NotConnected`
    closed: Arc<AtomicBool>,
}

impl DatabaseService {
    /// Open (or create) the store at the current target schema version
    ///
    /// This will:
    /// 1. Ensure the parent directory exists
    /// 2. Open/create the database file
    /// 3. Configure SQLite (WAL mode, busy timeout, foreign keys)
    /// 4. Upgrade the schema to [`TARGET_SCHEMA_VERSION`] if behind
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the directory or connection cannot be
    /// created, or `Blocked` / `UpgradeFailed` if the schema upgrade
    /// cannot complete (see module docs).
    pub async fn open(db_path: PathBuf) -> Result<Self, StoreError> {
        Self::open_at_version(db_path, TARGET_SCHEMA_VERSION).await
    }

    /// Open the store at an explicit target schema version.
    ///
    /// Only migration tests need a version other than
    /// [`TARGET_SCHEMA_VERSION`]; the terminal state is always
    /// `user_version == target_version`.
    pub async fn open_at_version(
        db_path: PathBuf,
        target_version: i64,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::DirectoryCreationFailed)?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| StoreError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            closed: Arc::new(AtomicBool::new(false)),
        };

        service.upgrade_schema(target_version).await?;

        Ok(service)
    }

    /// Path the store was opened at
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Mark the handle closed; subsequent operations fail with
    /// `NotConnected`.
    ///
    /// In-flight operations that already hold a connection are allowed to
    /// complete; their results are discarded by callers whose context is
    /// gone.
    pub fn close(&self) {
        tracing::info!("Closing store handle for {:?}", self.db_path);
        self.closed.store(true, Ordering::Release);
    }

    /// Get a connection with the busy timeout configured
    ///
    /// All async store operations go through here. The busy timeout makes
    /// concurrent operations wait and retry instead of failing immediately
    /// when the database is locked.
    pub async fn connect(&self) -> Result<Connection, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::NotConnected);
        }

        let conn = self
            .db
            .connect()
            .map_err(|e| StoreError::from_sql("Failed to connect", e))?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        Ok(conn)
    }

    /// Read the on-disk schema version
    pub async fn schema_version(&self) -> Result<i64, StoreError> {
        let conn = self.connect().await?;
        Self::read_user_version(&conn).await
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements can return rows, so query() is used instead of
    /// execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), StoreError> {
        let mut stmt = conn
            .prepare(pragma)
            .await
            .map_err(|e| StoreError::from_sql(format!("Failed to execute '{}'", pragma), e))?;
        let _ = stmt
            .query(())
            .await
            .map_err(|e| StoreError::from_sql(format!("Failed to execute '{}'", pragma), e))?;
        Ok(())
    }

    async fn read_user_version(conn: &Connection) -> Result<i64, StoreError> {
        let mut rows = conn
            .query("PRAGMA user_version", ())
            .await
            .map_err(|e| StoreError::from_sql("Failed to read user_version", e))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::from_sql("Failed to read user_version row", e))?
            .ok_or_else(|| StoreError::serialization("user_version returned no rows"))?;

        row.get(0)
            .map_err(|e| StoreError::from_sql("Failed to decode user_version", e))
    }

    /// Bring the on-disk layout up to `target_version`.
    ///
    /// All missing steps run inside one `BEGIN IMMEDIATE` transaction so a
    /// partial upgrade never becomes visible; the version stamp is the last
    /// statement before commit.
    async fn upgrade_schema(&self, target_version: i64) -> Result<(), StoreError> {
        let conn = self.connect().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000").await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON").await?;

        let current = Self::read_user_version(&conn).await?;
        if current >= target_version {
            tracing::debug!(
                "Store already at schema v{} (target v{})",
                current,
                target_version
            );
            return Ok(());
        }

        tracing::info!(
            "Upgrading store schema from v{} to v{}",
            current,
            target_version
        );

        // BEGIN IMMEDIATE takes the write lock up front; if another
        // connection holds it past the busy timeout, the upgrade is blocked
        // rather than failed.
        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            let msg = e.to_string();
            if msg.to_lowercase().contains("locked") || msg.to_lowercase().contains("busy") {
                StoreError::blocked(msg)
            } else {
                StoreError::from_sql("Failed to begin upgrade transaction", e)
            }
        })?;

        for version in (current + 1)..=target_version {
            if let Err(e) = migrations::apply_step(&conn, version).await {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(StoreError::upgrade_failed(
                    current,
                    target_version,
                    e.to_string(),
                ));
            }
        }

        // user_version does not accept bound parameters
        if let Err(e) = self
            .execute_pragma(&conn, &format!("PRAGMA user_version = {}", target_version))
            .await
        {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(StoreError::upgrade_failed(
                current,
                target_version,
                e.to_string(),
            ));
        }

        conn.execute("COMMIT", ()).await.map_err(|e| {
            StoreError::upgrade_failed(current, target_version, e.to_string())
        })?;

        tracing::info!("Store schema now at v{}", target_version);
        Ok(())
    }
}
