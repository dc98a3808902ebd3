//! Autosave Coordinator
//!
//! Persists the editor's live content to the store after a quiet period,
//! without losing edits or issuing overlapping writes:
//!
//! - Every content change restarts the debounce timer
//! - A firing with content equal to the last saved value is a no-op
//! - A firing while a save is in flight is dropped, not queued: the next
//!   content change re-arms the timer and retries naturally
//! - Write failures are never retried automatically; they are forwarded on
//!   a failure channel for the UI to surface, and the unchanged
//!   `last_saved` value means the next firing retries
//!
//! The in-flight guard is an application-level atomic flag, not an engine
//! lock; saves are spawned so the debounce loop keeps accepting edits
//! while a write is on the wire.
//!
//! ## Teardown
//!
//! Dropping the coordinator (or calling [`AutosaveCoordinator::shutdown`])
//! stops the debounce loop; an in-flight store write runs to completion
//! and its result is discarded.

use crate::db::DocumentStore;
use crate::services::error::ServiceError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Autosave configuration
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before a save fires
    pub debounce: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(800),
        }
    }
}

/// Debounced write-through of editor content for one document.
///
/// # Examples
///
/// ```no_run
/// # use inkdeck_core::db::{DatabaseService, DocumentStore, SqliteStore};
/// # use inkdeck_core::services::{AutosaveConfig, AutosaveCoordinator};
/// # use std::path::PathBuf;
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let db = Arc::new(DatabaseService::open(PathBuf::from("./inkdeck.db")).await?);
/// # let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(db));
/// let (autosave, mut failures) =
///     AutosaveCoordinator::new(store, "doc-1", AutosaveConfig::default());
///
/// autosave.content_changed("# Slide 1 (edited)");
///
/// let mut saving = autosave.subscribe_saving();
/// if *saving.borrow() {
///     // show "saving…" in the UI
/// }
/// # Ok(())
/// # }
/// ```
pub struct AutosaveCoordinator {
    update_tx: mpsc::UnboundedSender<String>,
    saving_rx: watch::Receiver<bool>,
    _shutdown_tx: mpsc::Sender<()>,
}

impl AutosaveCoordinator {
    /// Create a coordinator for `document_id` and start its debounce loop.
    ///
    /// Returns the coordinator plus the receiving end of the failure
    /// channel; the UI collaborator should drain it to notify the user of
    /// swallowed write failures (quota exhaustion in particular).
    pub fn new(
        store: Arc<dyn DocumentStore>,
        document_id: impl Into<String>,
        config: AutosaveConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceError>) {
        let document_id = document_id.into();
        let (update_tx, mut update_rx) = mpsc::unbounded_channel::<String>();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (saving_tx, saving_rx) = watch::channel(false);
        let (failure_tx, failure_rx) = mpsc::unbounded_channel::<ServiceError>();

        let in_flight = Arc::new(AtomicBool::new(false));
        let last_saved: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        tokio::spawn(async move {
            let mut pending: Option<String> = None;

            loop {
                tokio::select! {
                    biased; // Check shutdown first

                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Autosave loop for {} shutting down", document_id);
                        break;
                    }

                    changed = update_rx.recv() => {
                        match changed {
                            // Latest edit wins; the sleep arm below restarts
                            Some(content) => pending = Some(content),
                            None => {
                                tracing::debug!("Autosave channel closed for {}", document_id);
                                break;
                            }
                        }
                    }

                    // Recreated on every loop iteration, so any received
                    // edit above resets the quiet period
                    _ = tokio::time::sleep(config.debounce), if pending.is_some() => {
                        let Some(content) = pending.take() else { continue };

                        let unchanged = last_saved
                            .lock()
                            .map(|saved| saved.as_deref() == Some(content.as_str()))
                            .unwrap_or(false);
                        if unchanged {
                            tracing::debug!("Autosave skipped for {}: content unchanged", document_id);
                            continue;
                        }

                        // Drop, don't queue: a later edit will re-arm the timer
                        if in_flight
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_err()
                        {
                            tracing::debug!(
                                "Autosave skipped for {}: save already in flight",
                                document_id
                            );
                            continue;
                        }

                        let store = Arc::clone(&store);
                        let in_flight = Arc::clone(&in_flight);
                        let last_saved = Arc::clone(&last_saved);
                        let saving_tx = saving_tx.clone();
                        let failure_tx = failure_tx.clone();
                        let document_id = document_id.clone();

                        tokio::spawn(async move {
                            let _ = saving_tx.send(true);

                            match Self::save(&*store, &document_id, &content).await {
                                Ok(()) => {
                                    if let Ok(mut saved) = last_saved.lock() {
                                        *saved = Some(content);
                                    }
                                }
                                Err(e) => {
                                    // No automatic retry; last_saved stays
                                    // unchanged so the next firing retries
                                    tracing::warn!("Autosave failed for {}: {}", document_id, e);
                                    let _ = failure_tx.send(e);
                                }
                            }

                            in_flight.store(false, Ordering::Release);
                            let _ = saving_tx.send(false);
                        });
                    }
                }
            }
        });

        (
            Self {
                update_tx,
                saving_rx,
                _shutdown_tx: shutdown_tx,
            },
            failure_rx,
        )
    }

    /// Write `content` through the store, refreshing `updated_at`.
    async fn save(
        store: &dyn DocumentStore,
        document_id: &str,
        content: &str,
    ) -> Result<(), ServiceError> {
        let mut doc = store
            .get_document(document_id)
            .await?
            .ok_or_else(|| ServiceError::document_missing(document_id))?;

        doc.content = content.to_string();
        store.put_document(doc).await?;
        Ok(())
    }

    /// Report an editor content change; restarts the debounce timer.
    ///
    /// Non-blocking. Changes reported after shutdown are ignored.
    pub fn content_changed(&self, content: impl Into<String>) {
        if self.update_tx.send(content.into()).is_err() {
            tracing::warn!("Autosave loop has shut down, edit ignored");
        }
    }

    /// Subscribe to the boolean "saving" signal for UI display
    pub fn subscribe_saving(&self) -> watch::Receiver<bool> {
        self.saving_rx.clone()
    }

    /// Whether a save is currently in flight
    pub fn is_saving(&self) -> bool {
        *self.saving_rx.borrow()
    }

    /// Stop the debounce loop.
    ///
    /// Pending debounce timers are cancelled; an in-flight write completes
    /// and its result is discarded.
    pub fn shutdown(self) {
        tracing::debug!("Shutting down AutosaveCoordinator");
        // Dropping the channels stops the loop
    }
}
