//! Database Layer
//!
//! This module handles all persistence for Inkdeck using libsql:
//!
//! - Connection lifecycle and versioned schema upgrades
//! - Typed CRUD and indexed queries over the three entity families
//! - Cascade deletion of a document and its conversation entries
//!
//! # Architecture
//!
//! The [`DatabaseService`] handle is created once by the application shell
//! and injected everywhere (`Arc`-shared); components never reach for a
//! global. Services depend on the [`DocumentStore`] trait, not on the
//! libsql implementation, so the backend stays swappable and tests stay
//! cheap.

mod database;
mod document_store;
mod error;
mod migrations;
mod sqlite_store;

pub use database::DatabaseService;
pub use document_store::{CascadeOutcome, CascadePolicy, DocumentStore};
pub use error::StoreError;
pub use migrations::TARGET_SCHEMA_VERSION;
pub use sqlite_store::SqliteStore;
