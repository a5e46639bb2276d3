use crate::backend::BackendClient;
use crate::config::Config;
use crate::model::{Bookmark, BookmarkId, OwnerId, User};
use crate::store::{self, Applied, HighlightTracker, ReconciliationStore};
use crate::sync::{ConnectionState, FeedEvent, FeedMessage};
use crate::theme::Palette;
use ratatui::style::Style;
use std::borrow::Cow;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Longest URL accepted by the add form.
pub const MAX_URL_INPUT: usize = 2048;

// ============================================================================
// Confirmation Dialog
// ============================================================================

/// Pending confirmation action for destructive operations.
pub enum ConfirmAction {
    DeleteBookmark { id: BookmarkId, title: String },
}

// ============================================================================
// Add Form
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Url,
    Title,
}

/// State of the "add bookmark" dialog.
#[derive(Debug, Clone)]
pub struct AddForm {
    pub url: String,
    pub title: String,
    pub field: FormField,
    /// Inline validation or save error.
    pub error: Option<String>,
    /// A save is in flight; input is frozen until it reports back.
    pub saving: bool,
}

impl AddForm {
    pub fn new() -> Self {
        Self {
            url: String::new(),
            title: String::new(),
            field: FormField::Url,
            error: None,
            saving: false,
        }
    }

    pub fn toggle_field(&mut self) {
        self.field = match self.field {
            FormField::Url => FormField::Title,
            FormField::Title => FormField::Url,
        };
    }

    pub fn active_input(&mut self) -> &mut String {
        match self.field {
            FormField::Url => &mut self.url,
            FormField::Title => &mut self.title,
        }
    }

    fn active_limit(&self) -> usize {
        match self.field {
            FormField::Url => MAX_URL_INPUT,
            FormField::Title => crate::model::MAX_TITLE_LEN,
        }
    }

    /// Append a character unless the active field is full.
    pub fn push_char(&mut self, c: char) -> bool {
        let limit = self.active_limit();
        let input = self.active_input();
        if input.chars().count() >= limit {
            return false;
        }
        input.push(c);
        true
    }
}

impl Default for AddForm {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events from background tasks
pub enum AppEvent {
    /// The backend stored a new bookmark.
    BookmarkSaved(Bookmark),
    BookmarkSaveFailed {
        error: String,
    },
    /// The backend confirmed a delete.
    BookmarkDeleted {
        id: BookmarkId,
    },
    BookmarkDeleteFailed {
        id: BookmarkId,
        error: String,
    },
    /// Full list reload finished. `generation` drops results from
    /// superseded reloads.
    BookmarksReloaded {
        generation: u64,
        result: Result<Vec<Bookmark>, String>,
    },
    /// A background task panicked.
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state for one signed-in session.
pub struct App {
    pub user: User,
    pub backend: BackendClient,
    pub palette: Palette,

    // Data
    pub store: ReconciliationStore,
    pub highlights: HighlightTracker,
    pub connection: ConnectionState,
    /// The feed dropped since the last successful connect; events may
    /// have been missed.
    pub feed_lost: bool,

    // UI State
    /// Index into the visible (filtered) list.
    pub selected: usize,
    pub search_mode: bool,
    pub search_input: String,
    pub add_form: Option<AddForm>,
    pub pending_confirm: Option<ConfirmAction>,
    pub confirm_delete: bool,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub needs_redraw: bool,

    // Reload bookkeeping
    pub reload_generation: u64,
    pub reload_handle: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(user: User, backend: BackendClient, config: &Config) -> Self {
        let store = ReconciliationStore::new(user.id.clone());
        Self {
            user,
            backend,
            palette: Palette::default(),
            store,
            highlights: HighlightTracker::new(config.highlight_window()),
            connection: ConnectionState::Connecting,
            feed_lost: false,
            selected: 0,
            search_mode: false,
            search_input: String::new(),
            add_form: None,
            pending_confirm: None,
            confirm_delete: config.confirm_delete,
            status_message: None,
            needs_redraw: true,
            reload_generation: 0,
            reload_handle: None,
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.user.id
    }

    pub fn style(&self, role: &str) -> Style {
        self.palette.style(role)
    }

    /// Bookmarks matching the current search, in display order.
    pub fn visible(&self) -> Vec<&Bookmark> {
        store::filter(self.store.bookmarks(), &self.search_input)
    }

    pub fn selected_bookmark(&self) -> Option<&Bookmark> {
        self.visible().get(self.selected).copied()
    }

    pub fn result_summary(&self) -> String {
        store::result_summary(&self.search_input, self.visible().len(), self.store.len())
    }

    pub fn nav_down(&mut self) {
        let len = self.visible().len();
        if len > 0 && self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn nav_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Keep the selection inside the visible list after it shrinks.
    pub fn clamp_selection(&mut self) {
        let len = self.visible().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired (older than 3 seconds)
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= 3 {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    // ------------------------------------------------------------------------
    // Change feed
    // ------------------------------------------------------------------------

    /// Apply one message from the change feed.
    ///
    /// Returns true when the feed reconnected after a drop, so the caller
    /// should reload to pick up anything missed in between.
    pub fn apply_feed_message(&mut self, message: FeedMessage) -> bool {
        let resync = match message {
            FeedMessage::State(state) => self.set_connection(state),
            FeedMessage::Event(event) => {
                self.apply_feed_event(event);
                false
            }
        };
        self.needs_redraw = true;
        resync
    }

    fn apply_feed_event(&mut self, event: FeedEvent) -> Applied {
        let applied = match event {
            FeedEvent::Inserted(record) => {
                let id = record.id.clone();
                let applied = self.store.remote_inserted(record);
                if applied == Applied::Inserted {
                    self.highlights.mark(id);
                }
                applied
            }
            FeedEvent::Updated(record) => self.store.remote_updated(record),
            FeedEvent::Deleted(id) => {
                self.highlights.cancel(&id);
                self.store.remote_deleted(&id)
            }
        };
        tracing::debug!(?applied, "Applied feed event");
        if applied.changed() {
            self.clamp_selection();
        }
        applied
    }

    fn set_connection(&mut self, state: ConnectionState) -> bool {
        if self.connection == state {
            return false;
        }
        tracing::info!(from = ?self.connection, to = ?state, "Feed connection state changed");
        self.connection = state;
        match state {
            ConnectionState::Disconnected => {
                self.feed_lost = true;
                false
            }
            ConnectionState::Connected => std::mem::take(&mut self.feed_lost),
            ConnectionState::Connecting => false,
        }
    }

    /// Issue a new reload generation and start journaling store changes
    /// against its snapshot. Returns the generation.
    pub fn start_reload(&mut self) -> u64 {
        self.reload_generation = self.reload_generation.wrapping_add(1);
        self.store.begin_reload();
        self.reload_generation
    }

    /// A highlight window ran out.
    pub fn on_highlight_expired(&mut self, id: &BookmarkId) {
        tracing::trace!(id = %id, "Highlight expired");
        self.needs_redraw = true;
    }

    // ------------------------------------------------------------------------
    // Local actions
    // ------------------------------------------------------------------------

    /// Start an optimistic delete of `id`. Returns false if it is not listed.
    pub fn begin_delete(&mut self, id: &BookmarkId) -> bool {
        let applied = self.store.begin_delete(id);
        if applied != Applied::Removed {
            return false;
        }
        self.highlights.cancel(id);
        self.clamp_selection();
        true
    }
}

/// Abort in-flight background work on drop.
impl Drop for App {
    fn drop(&mut self) {
        if let Some(handle) = self.reload_handle.take() {
            handle.abort();
            tracing::debug!("Aborted reload task on App drop");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::UserMetadata;
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;
    use tokio::time::{self, Duration};

    pub(crate) fn test_app() -> App {
        let user = User {
            id: OwnerId::new("u1"),
            email: Some("ada@example.com".to_string()),
            user_metadata: UserMetadata {
                full_name: Some("Ada Lovelace".to_string()),
                avatar_url: None,
            },
        };
        let backend = BackendClient::new(
            "http://127.0.0.1:9",
            SecretString::from("anon".to_string()),
            SecretString::from("token".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        App::new(user, backend, &Config::default())
    }

    pub(crate) fn bookmark(id: &str, title: &str, created_secs: i64) -> Bookmark {
        let ts = Utc.timestamp_opt(1_700_000_000 + created_secs, 0).unwrap();
        Bookmark {
            id: BookmarkId::new(id),
            owner_id: OwnerId::new("u1"),
            title: title.to_string(),
            url: format!("https://{}.example.com", id),
            favicon_ref: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn test_nav_empty_list() {
        let mut app = test_app();
        app.nav_down();
        assert_eq!(app.selected, 0);
        assert!(app.selected_bookmark().is_none());
    }

    #[tokio::test]
    async fn test_nav_stays_in_bounds() {
        let mut app = test_app();
        app.store
            .replace_all(vec![bookmark("a", "A", 1), bookmark("b", "B", 2)]);
        app.nav_down();
        app.nav_down();
        assert_eq!(app.selected, 1);
        app.nav_up();
        app.nav_up();
        assert_eq!(app.selected, 0);
    }

    #[tokio::test]
    async fn test_status_expires_after_3_seconds() {
        let mut app = test_app();
        time::pause();
        app.set_status("Test message");

        time::advance(Duration::from_secs(2)).await;
        app.clear_expired_status();
        assert!(app.status_message.is_some()); // Still present at 2s

        time::advance(Duration::from_secs(2)).await;
        app.clear_expired_status();
        assert!(app.status_message.is_none()); // Expired after 3s
    }

    #[tokio::test]
    async fn test_remote_insert_is_highlighted() {
        let mut app = test_app();
        app.apply_feed_message(FeedMessage::Event(FeedEvent::Inserted(bookmark("a", "A", 1))));
        assert_eq!(app.store.len(), 1);
        assert!(app.highlights.is_highlighted(&BookmarkId::new("a")));
    }

    #[tokio::test]
    async fn test_duplicate_remote_insert_not_highlighted() {
        let mut app = test_app();
        app.store.local_insert(bookmark("a", "A", 1));
        app.apply_feed_message(FeedMessage::Event(FeedEvent::Inserted(bookmark("a", "A", 1))));
        assert_eq!(app.store.len(), 1);
        assert!(!app.highlights.is_highlighted(&BookmarkId::new("a")));
    }

    #[tokio::test]
    async fn test_remote_delete_cancels_highlight() {
        let mut app = test_app();
        app.apply_feed_message(FeedMessage::Event(FeedEvent::Inserted(bookmark("a", "A", 1))));
        app.apply_feed_message(FeedMessage::Event(FeedEvent::Deleted(BookmarkId::new("a"))));
        assert!(app.store.is_empty());
        assert!(app.highlights.is_empty());
    }

    #[tokio::test]
    async fn test_connection_state_tracked() {
        let mut app = test_app();
        assert_eq!(app.connection, ConnectionState::Connecting);
        app.apply_feed_message(FeedMessage::State(ConnectionState::Connected));
        assert_eq!(app.connection, ConnectionState::Connected);
        app.apply_feed_message(FeedMessage::State(ConnectionState::Disconnected));
        assert_eq!(app.connection.label(), "Offline");
    }

    #[tokio::test]
    async fn test_begin_delete_unknown_id() {
        let mut app = test_app();
        assert!(!app.begin_delete(&BookmarkId::new("nope")));
    }

    #[tokio::test]
    async fn test_search_narrows_visible_and_summary() {
        let mut app = test_app();
        app.store.replace_all(vec![
            bookmark("a", "Rust Book", 1),
            bookmark("b", "Tokio", 2),
        ]);
        assert_eq!(app.result_summary(), "Your Bookmarks (2)");

        app.search_input = "rust".to_string();
        assert_eq!(app.visible().len(), 1);
        assert_eq!(app.result_summary(), "1 result for \"rust\"");
        // Search never mutates the store
        assert_eq!(app.store.len(), 2);
    }

    #[test]
    fn test_form_respects_title_limit() {
        let mut form = AddForm::new();
        form.toggle_field();
        for _ in 0..crate::model::MAX_TITLE_LEN {
            assert!(form.push_char('x'));
        }
        assert!(!form.push_char('x'));
        assert_eq!(form.title.chars().count(), crate::model::MAX_TITLE_LEN);
    }
}
