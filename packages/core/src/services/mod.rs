//! Coordination Services
//!
//! Editor-facing services layered on the [`crate::db`] store:
//!
//! - [`ReferenceResolver`]: rewrites asset reference tokens to inline
//!   payloads, backed by a bounded cache with in-flight de-duplication
//! - [`AutosaveCoordinator`]: debounced write-through of live editor
//!   content, one save in flight at a time
//! - [`HistoryManager`] / [`HistoryRecorder`]: bounded undo/redo snapshot
//!   history with debounced capture
//!
//! All services take the store as `Arc<dyn DocumentStore>` so they can be
//! exercised against test doubles.

mod autosave;
mod error;
mod history;
mod resolver;

pub use autosave::{AutosaveConfig, AutosaveCoordinator};
pub use error::ServiceError;
pub use history::{HistoryConfig, HistoryManager, HistoryRecorder, MAX_HISTORY_SIZE};
pub use resolver::{ReferenceResolver, ResolverConfig};
