//! Application event handling.
//!
//! Applies background task results (save, delete, reload) and change feed
//! messages to the application state.

use crate::app::{App, AppEvent};
use crate::sync::FeedMessage;
use tokio::sync::mpsc;

use super::helpers::spawn_reload;

/// Handle a completion event from a background task.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    app.needs_redraw = true;
    match event {
        AppEvent::BookmarkSaved(bookmark) => {
            let title = bookmark.title.clone();
            let applied = app.store.local_insert(bookmark);
            tracing::debug!(?applied, "Applied saved bookmark");
            app.add_form = None;
            app.set_status(format!("Saved \"{}\"", title));
        }
        AppEvent::BookmarkSaveFailed { error } => {
            tracing::warn!(error = %error, "Failed to save bookmark");
            if let Some(form) = app.add_form.as_mut() {
                form.saving = false;
                form.error = Some(format!("Could not save: {}", error));
            } else {
                app.set_status(format!("Could not save bookmark: {}", error));
            }
        }
        AppEvent::BookmarkDeleted { id } => {
            app.store.confirm_delete(&id);
            app.set_status("Bookmark deleted");
        }
        AppEvent::BookmarkDeleteFailed { id, error } => {
            tracing::warn!(id = %id, error = %error, "Failed to delete bookmark, rolling back");
            let applied = app.store.rollback_delete(&id);
            tracing::debug!(?applied, "Rolled back optimistic delete");
            app.set_status(format!("Could not delete bookmark: {}", error));
        }
        AppEvent::BookmarksReloaded { generation, result } => {
            handle_reload(app, generation, result);
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::debug!(task, error = %error, "Task panic reported to UI");
            if task == "reload" {
                app.reload_handle = None;
                app.store.abandon_reload();
            }
            app.set_status(format!("Internal error in {} task", task));
        }
    }
    app.clamp_selection();
}

fn handle_reload(
    app: &mut App,
    generation: u64,
    result: Result<Vec<crate::model::Bookmark>, String>,
) {
    // Results from a superseded reload are dropped
    if generation != app.reload_generation {
        tracing::debug!(
            generation,
            current = app.reload_generation,
            "Ignoring stale reload"
        );
        return;
    }
    app.reload_handle = None;

    match result {
        Ok(records) => {
            app.highlights.clear();
            let count = app.store.finish_reload(records);
            app.set_status(format!("Loaded {} bookmarks", count));
        }
        Err(error) => {
            tracing::warn!(error = %error, "Reload failed");
            app.store.abandon_reload();
            app.set_status(format!("Reload failed: {}", error));
        }
    }
}

/// Handle a message from the change feed. A reconnect after a drop
/// triggers a reload to cover events sent while offline.
pub(super) fn handle_feed_message(
    app: &mut App,
    message: FeedMessage,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    if app.apply_feed_message(message) {
        tracing::info!("Change feed reconnected, reloading");
        spawn_reload(app, event_tx);
    }
}
