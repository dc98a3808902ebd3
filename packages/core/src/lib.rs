//! Inkdeck Core Persistence Layer
//!
//! This crate provides the embedded persistence and editor coordination
//! services for the Inkdeck document editor.
//!
//! # Architecture
//!
//! - **libsql**: Embedded SQLite-compatible database, one file per profile
//! - **Versioned schema**: `PRAGMA user_version` tracked, upgrades run in a
//!   single transaction at open
//! - **Trait seam**: services depend on [`db::DocumentStore`], not the
//!   libsql backend
//!
//! # Modules
//!
//! - [`models`] - Data structures (Document, ConversationEntry, Asset)
//! - [`db`] - Database layer: schema upgrades, typed CRUD, cascade deletion
//! - [`services`] - Reference resolution, autosave, undo/redo history

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use db::*;
pub use models::*;
pub use services::*;
