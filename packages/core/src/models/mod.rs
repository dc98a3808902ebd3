//! Data Models
//!
//! This module contains the entity families persisted by the Inkdeck store:
//!
//! - `Document` - Editable document with theme metadata
//! - `ConversationEntry` - One message of a document's AI conversation
//! - `Asset` - Inline-encoded binary attachment
//!
//! Plus the `TimeProvider` abstraction the store uses to refresh
//! `updated_at` deterministically in tests.

mod document;
pub mod time;

pub use document::{Asset, ConversationEntry, Document, Role, ValidationError, DEFAULT_THEME};
pub use time::{SystemTimeProvider, TimeProvider};
