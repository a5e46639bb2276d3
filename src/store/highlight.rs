//! Transient "new" markers for bookmarks that arrived over the change feed.
//!
//! Each mark owns a timer task. The task's handle is kept per id so a delete
//! (or a re-mark) can abort the pending expiry instead of letting it fire
//! against a stale set.

use crate::model::BookmarkId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default highlight window.
pub const DEFAULT_HIGHLIGHT_WINDOW: Duration = Duration::from_secs(2);

/// Expiry notice sent by a timer task. `seq` identifies the mark that
/// scheduled it.
#[derive(Debug)]
struct Expiry {
    id: BookmarkId,
    seq: u64,
}

struct Mark {
    seq: u64,
    deadline: Instant,
    timer: JoinHandle<()>,
}

/// Set of recently-arrived bookmark ids, each flagged for a bounded window.
///
/// Must be used inside a tokio runtime: marking spawns a timer task.
pub struct HighlightTracker {
    window: Duration,
    marks: HashMap<BookmarkId, Mark>,
    next_seq: u64,
    expiry_tx: mpsc::UnboundedSender<Expiry>,
    expiry_rx: mpsc::UnboundedReceiver<Expiry>,
}

impl HighlightTracker {
    pub fn new(window: Duration) -> Self {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Self {
            window,
            marks: HashMap::new(),
            next_seq: 0,
            expiry_tx,
            expiry_rx,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Flag `id` as new for one window.
    ///
    /// Re-marking an id aborts its previous timer first, so at most one timer
    /// per id is ever pending.
    pub fn mark(&mut self, id: BookmarkId) {
        if let Some(old) = self.marks.remove(&id) {
            old.timer.abort();
        }

        self.next_seq = self.next_seq.wrapping_add(1);
        let seq = self.next_seq;
        let tx = self.expiry_tx.clone();
        let window = self.window;
        let timer_id = id.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // Receiver lives as long as the tracker; a send error means it is gone.
            let _ = tx.send(Expiry { id: timer_id, seq });
        });

        self.marks.insert(
            id,
            Mark {
                seq,
                deadline: Instant::now() + window,
                timer,
            },
        );
    }

    /// Drop the mark for `id` and abort its timer. Returns false if the id
    /// was not marked.
    pub fn cancel(&mut self, id: &BookmarkId) -> bool {
        match self.marks.remove(id) {
            Some(mark) => {
                mark.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Drop every mark (reload, sign-out).
    pub fn clear(&mut self) {
        for (_, mark) in self.marks.drain() {
            mark.timer.abort();
        }
    }

    /// True while `id` is marked and its window has not elapsed.
    pub fn is_highlighted(&self, id: &BookmarkId) -> bool {
        self.marks
            .get(id)
            .is_some_and(|mark| Instant::now() < mark.deadline)
    }

    /// Number of live marks.
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Wait for the next expiry that actually clears a mark and return its id.
    ///
    /// Stale notices (the id was cancelled or re-marked since) are skipped:
    /// removal is check-then-remove against the mark's sequence number.
    /// Cancel-safe, so it can sit in a `tokio::select!` branch.
    pub async fn next_expired(&mut self) -> BookmarkId {
        loop {
            // The tracker holds a sender, so the channel never closes.
            let Some(expiry) = self.expiry_rx.recv().await else {
                return std::future::pending().await;
            };
            if self.clear_expired(&expiry.id, expiry.seq) {
                return expiry.id;
            }
        }
    }

    fn clear_expired(&mut self, id: &BookmarkId, seq: u64) -> bool {
        match self.marks.get(id) {
            Some(mark) if mark.seq == seq => {
                self.marks.remove(id);
                true
            }
            _ => {
                tracing::trace!(id = %id, seq, "Skipped stale highlight expiry");
                false
            }
        }
    }
}

impl Default for HighlightTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_WINDOW)
    }
}

/// Abort outstanding timers so no task outlives the tracker.
impl Drop for HighlightTracker {
    fn drop(&mut self) {
        self.clear();
    }
}
