//! Service Layer Error Types
//!
//! Errors surfaced by the coordination services (resolver, autosave) on
//! top of the store taxonomy in [`crate::db::StoreError`].

use crate::db::StoreError;
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Store operation failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// The document a service was bound to no longer exists
    #[error("Document not found: {id}")]
    DocumentMissing { id: String },
}

impl ServiceError {
    /// Create a document missing error
    pub fn document_missing(id: impl Into<String>) -> Self {
        Self::DocumentMissing { id: id.into() }
    }
}
