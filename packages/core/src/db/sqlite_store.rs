//! SqliteStore - DocumentStore Implementation for libsql
//!
//! Implements the [`DocumentStore`] trait over the shared
//! [`DatabaseService`] handle. All SQL for the three entity families lives
//! here, including row-to-model conversion with read-time defaulting and
//! the cascade deleter.
//!
//! # Design
//!
//! - **Row conversion is the normalization point**: rows written under
//!   older schema versions come back with NULL in later-added columns;
//!   `row_to_document` fills the documented defaults so callers never see
//!   a partially-populated model.
//! - **Store-controlled `updated_at`**: `put_document` ignores the
//!   caller-supplied value and stamps the injected [`TimeProvider`]'s
//!   current time, preserving `created_at` on upsert.
//! - **Cascade is transactional**: one read-write transaction spans the
//!   document row and the entry index scan; per-entry failure handling is
//!   a caller-chosen [`CascadePolicy`].

use crate::db::document_store::{CascadeOutcome, CascadePolicy, DocumentStore};
use crate::db::error::StoreError;
use crate::db::DatabaseService;
use crate::models::time::{SystemTimeProvider, TimeProvider};
use crate::models::{Asset, ConversationEntry, Document, Role, DEFAULT_THEME};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Connection, Row};
use std::sync::Arc;

/// libsql-backed document store
pub struct SqliteStore {
    /// Shared connection handle
    db: Arc<DatabaseService>,

    /// Clock used to refresh `updated_at` on document writes
    time: Arc<dyn TimeProvider>,
}

impl SqliteStore {
    /// Create a store over the shared handle, using the system clock
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self::with_time_provider(db, Arc::new(SystemTimeProvider))
    }

    /// Create a store with an injected clock (deterministic tests)
    pub fn with_time_provider(db: Arc<DatabaseService>, time: Arc<dyn TimeProvider>) -> Self {
        Self { db, time }
    }

    /// Parse a stored timestamp - handles RFC3339 and the bare SQLite
    /// `YYYY-MM-DD HH:MM:SS` format older tooling may have written
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        Err(StoreError::serialization(format!(
            "Unable to parse timestamp '{}'",
            s
        )))
    }

    /// Convert a documents row to a Document model
    ///
    /// Expected columns (in order): id, title, content, created_at,
    /// updated_at, selected_theme (nullable), custom_css (nullable).
    ///
    /// The nullable columns were added in schema v2/v3; rows predating them
    /// are normalized to the documented defaults here.
    fn row_to_document(row: &Row) -> Result<Document, StoreError> {
        let id = Self::get_text(row, 0, "id")?;
        let title = Self::get_text(row, 1, "title")?;
        let content = Self::get_text(row, 2, "content")?;
        let created_at_str = Self::get_text(row, 3, "created_at")?;
        let updated_at_str = Self::get_text(row, 4, "updated_at")?;
        let selected_theme = Self::get_opt_text(row, 5, "selected_theme")?;
        let custom_css = Self::get_opt_text(row, 6, "custom_css")?;

        Ok(Document {
            id,
            title,
            content,
            created_at: Self::parse_timestamp(&created_at_str)?,
            updated_at: Self::parse_timestamp(&updated_at_str)?,
            selected_theme: selected_theme.unwrap_or_else(|| DEFAULT_THEME.to_string()),
            custom_css: custom_css.unwrap_or_default(),
        })
    }

    /// Convert a conversation_entries row to a model
    ///
    /// Expected columns: id, document_id, role, content, timestamp,
    /// artifacts (nullable JSON text).
    fn row_to_entry(row: &Row) -> Result<ConversationEntry, StoreError> {
        let id = Self::get_text(row, 0, "id")?;
        let document_id = Self::get_text(row, 1, "document_id")?;
        let role_str = Self::get_text(row, 2, "role")?;
        let content = Self::get_text(row, 3, "content")?;
        let timestamp_str = Self::get_text(row, 4, "timestamp")?;
        let artifacts_json = Self::get_opt_text(row, 5, "artifacts")?;

        let role = Role::parse(&role_str)
            .map_err(|e| StoreError::serialization(e.to_string()))?;

        let artifacts = match artifacts_json {
            Some(json) => Some(
                serde_json::from_str(&json)
                    .map_err(|e| StoreError::serialization(format!("artifacts: {}", e)))?,
            ),
            None => None,
        };

        Ok(ConversationEntry {
            id,
            document_id,
            role,
            content,
            timestamp: Self::parse_timestamp(&timestamp_str)?,
            artifacts,
        })
    }

    /// Convert an assets row to a model
    ///
    /// Expected columns: id, name, binary_content, created_at.
    fn row_to_asset(row: &Row) -> Result<Asset, StoreError> {
        let id = Self::get_text(row, 0, "id")?;
        let name = Self::get_text(row, 1, "name")?;
        let binary_content = Self::get_text(row, 2, "binary_content")?;
        let created_at_str = Self::get_text(row, 3, "created_at")?;

        Ok(Asset {
            id,
            name,
            binary_content,
            created_at: Self::parse_timestamp(&created_at_str)?,
        })
    }

    fn get_text(row: &Row, idx: i32, name: &str) -> Result<String, StoreError> {
        row.get::<String>(idx)
            .map_err(|e| StoreError::from_sql(format!("Failed to get {}", name), e))
    }

    fn get_opt_text(row: &Row, idx: i32, name: &str) -> Result<Option<String>, StoreError> {
        row.get::<Option<String>>(idx)
            .map_err(|e| StoreError::from_sql(format!("Failed to get {}", name), e))
    }

    /// Scan the `(document_id, timestamp)` index and delete every entry it
    /// visits, honoring `policy` for per-entry failures.
    ///
    /// Runs inside the caller's open transaction. Failures to open or
    /// advance the scan are fatal; the caller rolls back.
    async fn delete_entries_in_txn(
        &self,
        conn: &Connection,
        document_id: &str,
        policy: CascadePolicy,
        outcome: &mut CascadeOutcome,
    ) -> Result<(), StoreError> {
        let mut rows = conn
            .query(
                "SELECT id FROM conversation_entries
                 WHERE document_id = ? ORDER BY timestamp",
                [document_id],
            )
            .await
            .map_err(|e| StoreError::from_sql("Failed to open entry scan", e))?;

        let mut entry_ids = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => entry_ids.push(Self::get_text(&row, 0, "id")?),
                Ok(None) => break,
                Err(e) => return Err(StoreError::from_sql("Failed to advance entry scan", e)),
            }
        }

        for entry_id in entry_ids {
            match conn
                .execute("DELETE FROM conversation_entries WHERE id = ?", [entry_id.as_str()])
                .await
            {
                Ok(_) => outcome.entries_deleted += 1,
                Err(e) => {
                    let err = StoreError::from_sql(
                        format!("Failed to delete entry {}", entry_id),
                        e,
                    );
                    match policy {
                        CascadePolicy::BestEffort => {
                            tracing::warn!(
                                "Cascade delete: entry {} failed, continuing: {}",
                                entry_id,
                                err
                            );
                            outcome.entry_failures.push((entry_id, err));
                        }
                        CascadePolicy::FailFast => return Err(err),
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.db.connect().await?;

        let mut rows = conn
            .query(
                "SELECT id, title, content, created_at, updated_at, selected_theme, custom_css
                 FROM documents WHERE id = ?",
                [id],
            )
            .await
            .map_err(|e| StoreError::from_sql("Failed to query document", e))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::from_sql("Failed to read document row", e))?
        {
            Some(row) => Ok(Some(Self::row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    async fn put_document(&self, mut doc: Document) -> Result<Document, StoreError> {
        doc.validate()
            .map_err(|e| StoreError::serialization(e.to_string()))?;

        // Store-controlled write timestamp; created_at of an existing row
        // is preserved by the upsert below.
        doc.updated_at = self.time.now();

        let conn = self.db.connect().await?;
        conn.execute(
            "INSERT INTO documents (id, title, content, created_at, updated_at, selected_theme, custom_css)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                updated_at = excluded.updated_at,
                selected_theme = excluded.selected_theme,
                custom_css = excluded.custom_css",
            (
                doc.id.as_str(),
                doc.title.as_str(),
                doc.content.as_str(),
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
                doc.selected_theme.as_str(),
                doc.custom_css.as_str(),
            ),
        )
        .await
        .map_err(|e| StoreError::from_sql("Failed to upsert document", e))?;

        Ok(doc)
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let conn = self.db.connect().await?;

        let mut rows = conn
            .query(
                "SELECT id, title, content, created_at, updated_at, selected_theme, custom_css
                 FROM documents ORDER BY updated_at DESC",
                (),
            )
            .await
            .map_err(|e| StoreError::from_sql("Failed to list documents", e))?;

        let mut documents = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::from_sql("Failed to read document row", e))?
        {
            documents.push(Self::row_to_document(&row)?);
        }
        Ok(documents)
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.db.connect().await?;
        let affected = conn
            .execute("DELETE FROM documents WHERE id = ?", [id])
            .await
            .map_err(|e| StoreError::from_sql("Failed to delete document", e))?;
        Ok(affected > 0)
    }

    async fn delete_document_cascade(
        &self,
        id: &str,
        policy: CascadePolicy,
    ) -> Result<CascadeOutcome, StoreError> {
        let conn = self.db.connect().await?;

        conn.execute("BEGIN TRANSACTION", ())
            .await
            .map_err(|e| StoreError::from_sql("Failed to begin cascade transaction", e))?;

        let mut outcome = CascadeOutcome::default();

        let doc_result = conn
            .execute("DELETE FROM documents WHERE id = ?", [id])
            .await;
        match doc_result {
            Ok(affected) => outcome.document_deleted = affected > 0,
            Err(e) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(StoreError::from_sql("Failed to delete document", e));
            }
        }

        if let Err(e) = self
            .delete_entries_in_txn(&conn, id, policy, &mut outcome)
            .await
        {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(e);
        }

        conn.execute("COMMIT", ()).await.map_err(|e| {
            StoreError::transaction_aborted(format!("Failed to commit cascade delete: {}", e))
        })?;

        if !outcome.is_clean() {
            tracing::warn!(
                "Cascade delete of {} completed with {} entry failures",
                id,
                outcome.entry_failures.len()
            );
        } else {
            tracing::debug!(
                "Cascade delete of {} removed {} entries",
                id,
                outcome.entries_deleted
            );
        }

        Ok(outcome)
    }

    async fn put_entry(&self, entry: ConversationEntry) -> Result<ConversationEntry, StoreError> {
        let artifacts_json = match &entry.artifacts {
            Some(value) => Some(
                serde_json::to_string(value)
                    .map_err(|e| StoreError::serialization(format!("artifacts: {}", e)))?,
            ),
            None => None,
        };

        let conn = self.db.connect().await?;
        conn.execute(
            "INSERT INTO conversation_entries (id, document_id, role, content, timestamp, artifacts)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                role = excluded.role,
                content = excluded.content,
                artifacts = excluded.artifacts",
            (
                entry.id.as_str(),
                entry.document_id.as_str(),
                entry.role.as_str(),
                entry.content.as_str(),
                entry.timestamp.to_rfc3339(),
                artifacts_json,
            ),
        )
        .await
        .map_err(|e| StoreError::from_sql("Failed to upsert entry", e))?;

        Ok(entry)
    }

    async fn list_entries(
        &self,
        document_id: &str,
    ) -> Result<Vec<ConversationEntry>, StoreError> {
        let conn = self.db.connect().await?;

        let mut rows = conn
            .query(
                "SELECT id, document_id, role, content, timestamp, artifacts
                 FROM conversation_entries
                 WHERE document_id = ? ORDER BY timestamp",
                [document_id],
            )
            .await
            .map_err(|e| StoreError::from_sql("Failed to list entries", e))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::from_sql("Failed to read entry row", e))?
        {
            entries.push(Self::row_to_entry(&row)?);
        }
        Ok(entries)
    }

    async fn clear_entries(&self, document_id: &str) -> Result<u64, StoreError> {
        let conn = self.db.connect().await?;
        conn.execute(
            "DELETE FROM conversation_entries WHERE document_id = ?",
            [document_id],
        )
        .await
        .map_err(|e| StoreError::from_sql("Failed to clear entries", e))
    }

    async fn put_asset(&self, asset: Asset) -> Result<Asset, StoreError> {
        let conn = self.db.connect().await?;
        conn.execute(
            "INSERT INTO assets (id, name, binary_content, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                binary_content = excluded.binary_content",
            (
                asset.id.as_str(),
                asset.name.as_str(),
                asset.binary_content.as_str(),
                asset.created_at.to_rfc3339(),
            ),
        )
        .await
        .map_err(|e| StoreError::from_sql("Failed to upsert asset", e))?;

        Ok(asset)
    }

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>, StoreError> {
        let conn = self.db.connect().await?;

        let mut rows = conn
            .query(
                "SELECT id, name, binary_content, created_at FROM assets WHERE id = ?",
                [id],
            )
            .await
            .map_err(|e| StoreError::from_sql("Failed to query asset", e))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::from_sql("Failed to read asset row", e))?
        {
            Some(row) => Ok(Some(Self::row_to_asset(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        let conn = self.db.connect().await?;

        let mut rows = conn
            .query(
                "SELECT id, name, binary_content, created_at
                 FROM assets ORDER BY created_at DESC",
                (),
            )
            .await
            .map_err(|e| StoreError::from_sql("Failed to list assets", e))?;

        let mut assets = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::from_sql("Failed to read asset row", e))?
        {
            assets.push(Self::row_to_asset(&row)?);
        }
        Ok(assets)
    }

    async fn delete_asset(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.db.connect().await?;
        let affected = conn
            .execute("DELETE FROM assets WHERE id = ?", [id])
            .await
            .map_err(|e| StoreError::from_sql("Failed to delete asset", e))?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let dt = SqliteStore::parse_timestamp("2024-06-01T12:30:00+00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-06-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_sqlite_format() {
        let dt = SqliteStore::parse_timestamp("2024-06-01 12:30:00").unwrap();
        assert_eq!(dt.timestamp(), 1717245000);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(SqliteStore::parse_timestamp("yesterday").is_err());
    }
}
