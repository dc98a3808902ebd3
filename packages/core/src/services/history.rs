//! Undo/Redo History
//!
//! An in-memory ring of content snapshots with a cursor, independent of
//! the persisted store. Recording past the capacity bound drops the oldest
//! snapshot; recording after undos truncates the redo branch permanently.
//!
//! [`HistoryManager`] is the pure data structure; [`HistoryRecorder`]
//! wraps it with debounced capture (so every keystroke does not become an
//! undo step) and a replay guard (so applying an undo/redo result does not
//! record itself as a new step).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Maximum number of snapshots retained
pub const MAX_HISTORY_SIZE: usize = 50;

/// History configuration
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Snapshot capacity bound
    pub capacity: usize,

    /// Quiet period after the last edit before a snapshot is captured.
    /// Shorter than the autosave debounce so undo granularity tracks
    /// pauses in typing, not saves.
    pub debounce: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_HISTORY_SIZE,
            debounce: Duration::from_millis(500),
        }
    }
}

/// Bounded undo/redo snapshot buffer.
///
/// # Examples
///
/// ```rust
/// use inkdeck_core::services::HistoryManager;
///
/// let mut history = HistoryManager::new("A");
/// history.record("B");
/// history.record("C");
///
/// assert_eq!(history.undo(), Some("B".to_string()));
/// assert_eq!(history.undo(), Some("A".to_string()));
/// assert!(!history.can_undo());
/// assert_eq!(history.redo(), Some("B".to_string()));
/// ```
#[derive(Debug)]
pub struct HistoryManager {
    snapshots: Vec<String>,
    cursor: usize,
    capacity: usize,
}

impl HistoryManager {
    /// Create a history seeded with the document's initial content
    pub fn new(initial: impl Into<String>) -> Self {
        Self::with_capacity(initial, MAX_HISTORY_SIZE)
    }

    /// Create a history with an explicit capacity bound
    pub fn with_capacity(initial: impl Into<String>, capacity: usize) -> Self {
        Self {
            snapshots: vec![initial.into()],
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record a new snapshot.
    ///
    /// No-op when `content` equals the snapshot at the cursor (this also
    /// absorbs the editor echo of an applied undo/redo). Otherwise the
    /// redo branch past the cursor is discarded, the snapshot appended,
    /// and the oldest snapshot dropped if the capacity bound is exceeded.
    ///
    /// Returns whether a snapshot was recorded.
    pub fn record(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if self.snapshots[self.cursor] == content {
            return false;
        }

        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(content);
        if self.snapshots.len() > self.capacity {
            self.snapshots.remove(0);
        }
        self.cursor = self.snapshots.len() - 1;
        true
    }

    /// Step back one snapshot; returns the content to apply
    pub fn undo(&mut self) -> Option<String> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.snapshots[self.cursor].clone())
    }

    /// Step forward one snapshot; returns the content to apply
    pub fn redo(&mut self) -> Option<String> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.snapshots[self.cursor].clone())
    }

    /// Whether a step back exists
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Whether a step forward exists
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Number of retained snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always false; the buffer retains at least the seed snapshot
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot at the cursor
    pub fn current(&self) -> &str {
        &self.snapshots[self.cursor]
    }
}

enum RecorderCommand {
    /// Editor content changed; capture after the quiet period
    Change(String),
    /// Discard any pending capture (undo/redo applied)
    CancelPending,
}

/// Debounced capture front-end for [`HistoryManager`].
///
/// Content changes are captured as snapshots only after a quiet period.
/// Undo/redo cancel any pending capture and hold a reentrancy flag for
/// their duration, so a replayed snapshot is not recorded as a new edit.
pub struct HistoryRecorder {
    history: Arc<Mutex<HistoryManager>>,
    command_tx: mpsc::UnboundedSender<RecorderCommand>,
    replaying: Arc<AtomicBool>,
    _shutdown_tx: mpsc::Sender<()>,
}

impl HistoryRecorder {
    /// Create a recorder seeded with the document's initial content
    pub fn new(initial: impl Into<String>, config: HistoryConfig) -> Self {
        let history = Arc::new(Mutex::new(HistoryManager::with_capacity(
            initial,
            config.capacity,
        )));
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<RecorderCommand>();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let history_for_task = Arc::clone(&history);
        tokio::spawn(async move {
            let mut pending: Option<String> = None;

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => break,

                    command = command_rx.recv() => {
                        match command {
                            Some(RecorderCommand::Change(content)) => pending = Some(content),
                            Some(RecorderCommand::CancelPending) => pending = None,
                            None => break,
                        }
                    }

                    _ = tokio::time::sleep(config.debounce), if pending.is_some() => {
                        if let Some(content) = pending.take() {
                            if let Ok(mut history) = history_for_task.lock() {
                                history.record(content);
                            }
                        }
                    }
                }
            }
        });

        Self {
            history,
            command_tx,
            replaying: Arc::new(AtomicBool::new(false)),
            _shutdown_tx: shutdown_tx,
        }
    }

    /// Report an editor content change.
    ///
    /// Ignored while an undo/redo is in progress (reentrancy guard).
    pub fn note_change(&self, content: impl Into<String>) {
        if self.replaying.load(Ordering::Acquire) {
            tracing::debug!("History capture suppressed during replay");
            return;
        }
        let _ = self.command_tx.send(RecorderCommand::Change(content.into()));
    }

    /// Step back; returns the content the editor should apply
    pub fn undo(&self) -> Option<String> {
        self.replaying.store(true, Ordering::Release);
        let _ = self.command_tx.send(RecorderCommand::CancelPending);
        let result = self.history.lock().ok().and_then(|mut h| h.undo());
        self.replaying.store(false, Ordering::Release);
        result
    }

    /// Step forward; returns the content the editor should apply
    pub fn redo(&self) -> Option<String> {
        self.replaying.store(true, Ordering::Release);
        let _ = self.command_tx.send(RecorderCommand::CancelPending);
        let result = self.history.lock().ok().and_then(|mut h| h.redo());
        self.replaying.store(false, Ordering::Release);
        result
    }

    /// Whether a step back exists
    pub fn can_undo(&self) -> bool {
        self.history.lock().map(|h| h.can_undo()).unwrap_or(false)
    }

    /// Whether a step forward exists
    pub fn can_redo(&self) -> bool {
        self.history.lock().map(|h| h.can_redo()).unwrap_or(false)
    }

    /// Capture `content` immediately, bypassing the debounce (used at
    /// teardown so the last edit is not lost).
    ///
    /// Any pending debounced capture is cancelled; the flushed content is
    /// the newer of the two and a late capture would land a stale snapshot
    /// on top of it.
    pub fn flush(&self, content: impl Into<String>) {
        let _ = self.command_tx.send(RecorderCommand::CancelPending);
        if let Ok(mut history) = self.history.lock() {
            history.record(content);
        }
    }
}
