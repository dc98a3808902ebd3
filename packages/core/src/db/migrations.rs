//! Schema Migrations
//!
//! The store layout is versioned with the SQLite `user_version` pragma and
//! upgraded by running every step between the on-disk version and the
//! target version inside a single upgrade transaction.
//!
//! # Rules
//!
//! - Steps are purely additive: no table or index is ever dropped or
//!   renamed, so older application builds can still read the data.
//! - Every step is idempotent (`CREATE ... IF NOT EXISTS`; column adds are
//!   guarded by a `table_info` probe), so re-running a partially applied
//!   step is safe.
//! - Fields introduced by later versions are defaulted at read time by the
//!   row conversion in [`crate::db::SqliteStore`], never backfilled here.
//!
//! # Version history
//!
//! | Version | Change |
//! |---------|--------|
//! | 1 | `documents`, `conversation_entries`, `assets` tables + indexes |
//! | 2 | `documents.selected_theme` column |
//! | 3 | `documents.custom_css` column |

use crate::db::error::StoreError;
use libsql::Connection;

/// The schema version current builds open the store at
pub const TARGET_SCHEMA_VERSION: i64 = 3;

/// Apply one migration step, upgrading the layout from `version - 1` to
/// `version`.
///
/// Called by `DatabaseService::open` for each missing version in order,
/// inside the upgrade transaction.
pub(crate) async fn apply_step(conn: &Connection, version: i64) -> Result<(), StoreError> {
    match version {
        1 => create_base_tables(conn).await,
        2 => add_document_column(conn, "selected_theme", "TEXT").await,
        3 => add_document_column(conn, "custom_css", "TEXT").await,
        other => Err(StoreError::Sql {
            context: format!("No migration step defined for schema version {}", other),
        }),
    }
}

/// v1: the three entity-family tables and their indexes
async fn create_base_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::from_sql("Failed to create documents table", e))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS conversation_entries (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            artifacts TEXT
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::from_sql("Failed to create conversation_entries table", e))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            binary_content TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::from_sql("Failed to create assets table", e))?;

    // Composite index backing list_entries / cascade scans
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_document_timestamp
         ON conversation_entries(document_id, timestamp)",
        (),
    )
    .await
    .map_err(|e| StoreError::from_sql("Failed to create index 'idx_entries_document_timestamp'", e))?;

    // Index backing list_assets (newest first)
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assets_created ON assets(created_at)",
        (),
    )
    .await
    .map_err(|e| StoreError::from_sql("Failed to create index 'idx_assets_created'", e))?;

    Ok(())
}

/// Add a nullable column to `documents` if it is not already present.
///
/// SQLite's ALTER TABLE ADD COLUMN is not itself idempotent, so existence
/// is probed through `pragma_table_info` first.
async fn add_document_column(
    conn: &Connection,
    column: &str,
    column_type: &str,
) -> Result<(), StoreError> {
    if document_column_exists(conn, column).await? {
        tracing::debug!("Migration step skipped, column documents.{} exists", column);
        return Ok(());
    }

    conn.execute(
        &format!("ALTER TABLE documents ADD COLUMN {} {}", column, column_type),
        (),
    )
    .await
    .map_err(|e| StoreError::from_sql(format!("Failed to add documents.{}", column), e))?;

    Ok(())
}

async fn document_column_exists(conn: &Connection, column: &str) -> Result<bool, StoreError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM pragma_table_info('documents') WHERE name = ?",
            [column],
        )
        .await
        .map_err(|e| StoreError::from_sql("Failed to probe documents columns", e))?;

    let row = rows
        .next()
        .await
        .map_err(|e| StoreError::from_sql("Failed to read column probe result", e))?
        .ok_or_else(|| StoreError::serialization("Column probe returned no rows"))?;

    let count: i64 = row
        .get(0)
        .map_err(|e| StoreError::from_sql("Failed to decode column probe result", e))?;

    Ok(count > 0)
}
