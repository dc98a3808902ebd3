//! DocumentStore Trait - Persistence Abstraction Layer
//!
//! This trait sits between the services (resolver, autosave) and the libsql
//! implementation so business logic never touches SQL directly and tests
//! can substitute stores.
//!
//! # Conventions
//!
//! - All methods are async; implementations must be `Send + Sync` because
//!   futures are moved between threads at await points.
//! - Absence is `Ok(None)` / `Ok(false)`, not an error.
//! - Reads are read-only statements; writes are upserts; multi-statement
//!   work (cascade delete) runs inside an explicit transaction.
//!
//! # Examples
//!
//! ```no_run
//! use inkdeck_core::db::{DatabaseService, DocumentStore, SqliteStore};
//! use inkdeck_core::models::Document;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(DatabaseService::open(PathBuf::from("./inkdeck.db")).await?);
//!     let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(db));
//!
//!     let doc = store.put_document(Document::new("Untitled", "# Slide 1")).await?;
//!     assert!(store.get_document(&doc.id).await?.is_some());
//!     Ok(())
//! }
//! ```

use crate::db::error::StoreError;
use crate::models::{Asset, ConversationEntry, Document};
use async_trait::async_trait;

/// Failure handling policy for cascade deletion.
///
/// The source design continued past individual entry failures; that choice
/// is surfaced here as an explicit policy instead of being hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadePolicy {
    /// Collect per-entry failures into the outcome and keep scanning;
    /// the overall operation still succeeds (default)
    #[default]
    BestEffort,

    /// Abort and roll back the whole transaction on the first entry
    /// failure
    FailFast,
}

/// Outcome of a cascade delete.
///
/// With [`CascadePolicy::BestEffort`], `entry_failures` carries whatever
/// individual deletes failed; the operation as a whole still resolved.
#[derive(Debug, Default)]
pub struct CascadeOutcome {
    /// Whether the document row itself existed and was deleted
    pub document_deleted: bool,

    /// Number of conversation entries removed
    pub entries_deleted: u64,

    /// Per-entry failures collected under best-effort policy
    pub entry_failures: Vec<(String, StoreError)>,
}

impl CascadeOutcome {
    /// True when every visited entry was deleted
    pub fn is_clean(&self) -> bool {
        self.entry_failures.is_empty()
    }
}

/// Abstraction over the three entity families persisted by Inkdeck.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    //
    // DOCUMENT OPERATIONS
    //

    /// Get a document by id.
    ///
    /// Rows written under older schema versions are normalized: a missing
    /// theme becomes [`crate::models::DEFAULT_THEME`], missing custom CSS
    /// becomes empty.
    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Upsert a document keyed by id.
    ///
    /// The caller-supplied `updated_at` is overridden with the store's
    /// current time on every write, keeping it monotonically non-decreasing
    /// per id; `created_at` of an existing row is preserved. Returns the
    /// document as written.
    async fn put_document(&self, doc: Document) -> Result<Document, StoreError>;

    /// List all documents, most recently updated first
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;

    /// Delete a single document row; no cascade.
    ///
    /// Returns `false` if no row matched.
    async fn delete_document(&self, id: &str) -> Result<bool, StoreError>;

    /// Delete a document together with every conversation entry that
    /// references it, as one unit of work.
    ///
    /// Per-entry failure handling follows `policy`; failure to open the
    /// entry scan is always fatal and rolls the transaction back.
    async fn delete_document_cascade(
        &self,
        id: &str,
        policy: CascadePolicy,
    ) -> Result<CascadeOutcome, StoreError>;

    //
    // CONVERSATION ENTRY OPERATIONS
    //

    /// Upsert a conversation entry keyed by id
    async fn put_entry(&self, entry: ConversationEntry) -> Result<ConversationEntry, StoreError>;

    /// List a document's entries ordered by timestamp ascending
    async fn list_entries(&self, document_id: &str)
        -> Result<Vec<ConversationEntry>, StoreError>;

    /// Delete all entries for a document; returns the number removed
    async fn clear_entries(&self, document_id: &str) -> Result<u64, StoreError>;

    //
    // ASSET OPERATIONS
    //

    /// Upsert an asset keyed by id
    async fn put_asset(&self, asset: Asset) -> Result<Asset, StoreError>;

    /// Get an asset by id
    async fn get_asset(&self, id: &str) -> Result<Option<Asset>, StoreError>;

    /// List all assets ordered by creation time, newest first
    async fn list_assets(&self) -> Result<Vec<Asset>, StoreError>;

    /// Delete a single asset; returns `false` if no row matched.
    ///
    /// Callers holding a [`crate::services::ReferenceResolver`] should
    /// invalidate the asset's cache entry afterwards; the cache never
    /// checks staleness on its own.
    async fn delete_asset(&self, id: &str) -> Result<bool, StoreError>;
}
