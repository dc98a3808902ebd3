//! Entity Models
//!
//! This module defines the three entity families persisted by the Inkdeck
//! store:
//!
//! - `Document` - An editable document with theme and styling metadata
//! - `ConversationEntry` - One message of a document's AI conversation
//! - `Asset` - An inline-encoded binary attachment referenced from content
//!
//! # Schema Evolution
//!
//! The store layout is upgraded additively (see [`crate::db`]); fields that
//! did not exist in older layout versions (`selected_theme`, `custom_css`)
//! are defaulted at read time, so every `Document` handed to callers is
//! fully populated regardless of when the row was written.
//!
//! # Examples
//!
//! ```rust
//! use inkdeck_core::models::{Document, ConversationEntry, Role};
//!
//! let doc = Document::new("Quarterly review", "# Slide 1");
//! let entry = ConversationEntry::new(&doc.id, Role::User, "Make it shorter", None);
//! assert_eq!(entry.document_id, doc.id);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Theme applied to documents whose row predates the theme column
pub const DEFAULT_THEME: &str = "default";

/// Validation errors for entity construction and persistence
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid entity ID format: {0}")]
    InvalidId(String),

    #[error("Unknown conversation role: {0}")]
    UnknownRole(String),
}

/// An editable document owned by the user session.
///
/// # Fields
///
/// - `id`: Stable unique identifier (UUID v4)
/// - `title`: Display title
/// - `content`: Markdown body, may embed `![alt](asset://<id>)` tokens
/// - `created_at`: Set once at creation
/// - `updated_at`: Refreshed by the store on every write; monotonically
///   non-decreasing for a given `id`
/// - `selected_theme`: Theme name, defaults to [`DEFAULT_THEME`]
/// - `custom_css`: Optional user stylesheet, defaults to empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier
    pub id: String,

    /// Display title
    pub title: String,

    /// Markdown body
    pub content: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last write timestamp (store-controlled, see `DocumentStore::put_document`)
    pub updated_at: DateTime<Utc>,

    /// Selected presentation theme
    #[serde(default = "default_theme")]
    pub selected_theme: String,

    /// User-supplied CSS overrides
    #[serde(default)]
    pub custom_css: String,
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

impl Document {
    /// Create a new Document with an auto-generated UUID and default theme
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use inkdeck_core::models::Document;
    /// let doc = Document::new("Untitled", "# Slide 1");
    /// assert_eq!(doc.selected_theme, "default");
    /// assert!(doc.custom_css.is_empty());
    /// ```
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
            selected_theme: default_theme(),
            custom_css: String::new(),
        }
    }

    /// Create a Document with a caller-chosen id (tests, imports)
    pub fn new_with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut doc = Self::new(title, content);
        doc.id = id.into();
        doc
    }

    /// Validate required fields before persistence
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()));
        }
        Ok(())
    }
}

/// Role of a conversation entry within a document's chat history.
///
/// Closed set; persisted as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message authored by the user
    User,
    /// Message produced by the AI collaborator
    Assistant,
    /// System notice injected by the application
    System,
}

impl Role {
    /// Database text representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse the database text representation
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

/// One message of a document's conversation history.
///
/// Entries are ordered by the composite key `(document_id, timestamp)`.
/// The `artifacts` payload is produced by the AI collaborator and is opaque
/// to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    /// Unique identifier
    pub id: String,

    /// Owning document (must exist at write time; enforced by the caller,
    /// which always writes the document first)
    pub document_id: String,

    /// Author role
    pub role: Role,

    /// Message text
    pub content: String,

    /// Message timestamp (ordering key within a document)
    pub timestamp: DateTime<Utc>,

    /// Opaque generated-artifact payload from the AI collaborator
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<serde_json::Value>,
}

impl ConversationEntry {
    /// Create a new entry with an auto-generated UUID and current timestamp
    pub fn new(
        document_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        artifacts: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            artifacts,
        }
    }
}

/// A binary attachment, stored inline-encoded (data URL).
///
/// Assets are referenced from document content via `![alt](asset://<id>)`
/// tokens and resolved to their payload by
/// [`crate::services::ReferenceResolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Unique identifier
    pub id: String,

    /// Original file name
    pub name: String,

    /// Inline-encoded payload (data URL)
    pub binary_content: String,

    /// Creation timestamp (assets are listed newest-first)
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Create a new asset with an auto-generated UUID
    pub fn new(name: impl Into<String>, binary_content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            binary_content: binary_content.into(),
            created_at: Utc::now(),
        }
    }

    /// The reference token that embeds this asset in document content
    pub fn reference_token(&self, alt_text: &str) -> String {
        format!("![{}](asset://{})", alt_text, self.id)
    }
}
