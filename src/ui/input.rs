//! Input handling for the TUI.
//!
//! Routes key presses to the active overlay (confirm dialog, add form,
//! search line) or to the list.

use crate::app::{AddForm, App, AppEvent, ConfirmAction};
use crate::model::NewBookmark;
use crate::util::{validate_url_for_open, MAX_SEARCH_QUERY_LENGTH};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::{spawn_delete, spawn_reload, spawn_save};
use super::Action;

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    // Ctrl+C quits from anywhere; raw mode swallows SIGINT
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Ok(Action::Quit);
    }

    // Overlays capture all keys when visible
    if app.pending_confirm.is_some() {
        return Ok(handle_confirm_input(app, code, event_tx));
    }
    if app.add_form.is_some() {
        return Ok(handle_form_input(app, code, event_tx));
    }
    if app.search_mode {
        return Ok(handle_search_input(app, code));
    }

    handle_list_input(app, code, event_tx)
}

/// Handle input on the bookmark list.
fn handle_list_input(
    app: &mut App,
    code: KeyCode,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down => app.nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.nav_up(),
        KeyCode::Char('g') | KeyCode::Home => app.selected = 0,
        KeyCode::Char('G') | KeyCode::End => {
            app.selected = app.visible().len().saturating_sub(1);
        }
        KeyCode::Char('/') => {
            app.search_mode = true;
        }
        KeyCode::Esc => {
            // Clear an applied filter
            if !app.search_input.is_empty() {
                app.search_input.clear();
                app.selected = 0;
            }
        }
        KeyCode::Char('a') => {
            app.add_form = Some(AddForm::new());
        }
        KeyCode::Char('d') => request_delete(app, event_tx),
        KeyCode::Char('o') => open_selected(app)?,
        KeyCode::Char('r') => spawn_reload(app, event_tx),
        _ => {}
    }
    Ok(Action::Continue)
}

/// Start deleting the selected bookmark, asking first when configured to.
fn request_delete(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(bookmark) = app.selected_bookmark() else {
        return;
    };
    let id = bookmark.id.clone();
    let title = bookmark.title.clone();

    if app.confirm_delete {
        app.pending_confirm = Some(ConfirmAction::DeleteBookmark { id, title });
    } else {
        delete_now(app, id, title, event_tx);
    }
}

fn delete_now(
    app: &mut App,
    id: crate::model::BookmarkId,
    title: String,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    if app.begin_delete(&id) {
        app.set_status(format!("Deleting \"{}\"...", title));
        spawn_delete(app, id, event_tx);
    } else {
        // Removed by another session while the dialog was open
        app.set_status("Bookmark already removed");
    }
}

fn open_selected(app: &mut App) -> Result<()> {
    let Some(bookmark) = app.selected_bookmark() else {
        return Ok(());
    };
    // Validate before handing the URL to the system opener
    match validate_url_for_open(&bookmark.url) {
        Ok(url) => {
            if let Err(e) = open::that(url.as_str()) {
                tracing::warn!(error = %e, url = %url, "Failed to open browser");
                app.set_status(format!("Failed to open browser: {}", e));
            }
        }
        Err(e) => {
            app.set_status(format!("Cannot open: {}", e));
        }
    }
    Ok(())
}

/// Handle input while the delete confirmation is visible.
fn handle_confirm_input(
    app: &mut App,
    code: KeyCode,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            if let Some(ConfirmAction::DeleteBookmark { id, title }) = app.pending_confirm.take() {
                delete_now(app, id, title, event_tx);
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.pending_confirm = None;
            app.set_status("Cancelled");
        }
        _ => {}
    }
    Action::Continue
}

/// Handle input while the add form is visible.
fn handle_form_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    let owner = app.owner().clone();
    let Some(form) = app.add_form.as_mut() else {
        return Action::Continue;
    };

    if code == KeyCode::Esc {
        app.add_form = None;
        return Action::Continue;
    }
    // Frozen while the save is in flight
    if form.saving {
        return Action::Continue;
    }

    match code {
        KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
        KeyCode::Backspace => {
            form.active_input().pop();
            form.error = None;
        }
        KeyCode::Char(c) => {
            form.push_char(c);
            form.error = None;
        }
        KeyCode::Enter => match NewBookmark::new(owner, &form.title, &form.url) {
            Ok(new) => {
                form.saving = true;
                form.error = None;
                spawn_save(app, new, event_tx);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bookmark input");
                form.error = Some(e.to_string());
            }
        },
        _ => {}
    }
    Action::Continue
}

/// Handle input while typing a search query.
fn handle_search_input(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Esc => {
            app.search_mode = false;
            app.search_input.clear();
        }
        KeyCode::Enter => {
            app.search_mode = false;
        }
        KeyCode::Backspace => {
            app.search_input.pop();
        }
        KeyCode::Char(c) => {
            // Prevent input beyond max search length
            if app.search_input.chars().count() >= MAX_SEARCH_QUERY_LENGTH {
                app.set_status(format!(
                    "Search query at max length ({} chars)",
                    MAX_SEARCH_QUERY_LENGTH
                ));
                return Action::Continue;
            }
            app.search_input.push(c);
        }
        _ => {}
    }
    app.selected = 0;
    Action::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{bookmark, test_app};
    use crate::app::FormField;
    use crate::model::BookmarkId;

    fn press(app: &mut App, code: KeyCode, tx: &mpsc::Sender<AppEvent>) -> Action {
        handle_input(app, code, KeyModifiers::NONE, tx).unwrap()
    }

    fn type_str(app: &mut App, s: &str, tx: &mpsc::Sender<AppEvent>) {
        for c in s.chars() {
            press(app, KeyCode::Char(c), tx);
        }
    }

    #[tokio::test]
    async fn test_quit() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        assert!(matches!(press(&mut app, KeyCode::Char('q'), &tx), Action::Quit));
        let action = handle_input(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL, &tx).unwrap();
        assert!(matches!(action, Action::Quit));
    }

    #[tokio::test]
    async fn test_delete_confirm_flow() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        app.store.replace_all(vec![bookmark("a", "Rust", 1)]);

        press(&mut app, KeyCode::Char('d'), &tx);
        match &app.pending_confirm {
            Some(ConfirmAction::DeleteBookmark { id, title }) => {
                assert_eq!(id.as_str(), "a");
                assert_eq!(title, "Rust");
            }
            None => panic!("Expected DeleteBookmark confirm action"),
        }
        // Nothing removed until confirmed
        assert_eq!(app.store.len(), 1);

        press(&mut app, KeyCode::Char('y'), &tx);
        assert!(app.pending_confirm.is_none());
        assert!(app.store.is_empty());
        assert!(app.store.is_pending_delete(&BookmarkId::new("a")));
    }

    #[tokio::test]
    async fn test_delete_cancel_applies_nothing() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        app.store.replace_all(vec![bookmark("a", "Rust", 1)]);

        press(&mut app, KeyCode::Char('d'), &tx);
        press(&mut app, KeyCode::Esc, &tx);
        assert!(app.pending_confirm.is_none());
        assert_eq!(app.store.len(), 1);
        assert!(!app.store.is_pending_delete(&BookmarkId::new("a")));
    }

    #[tokio::test]
    async fn test_delete_without_confirmation() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        app.confirm_delete = false;
        app.store.replace_all(vec![bookmark("a", "Rust", 1)]);

        press(&mut app, KeyCode::Char('d'), &tx);
        assert!(app.pending_confirm.is_none());
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_after_remote_delete() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        app.store.replace_all(vec![bookmark("a", "Rust", 1)]);
        press(&mut app, KeyCode::Char('d'), &tx);

        // Another session deletes it while the dialog is open
        app.store.remote_deleted(&BookmarkId::new("a"));
        press(&mut app, KeyCode::Char('y'), &tx);

        assert!(app.store.is_empty());
        assert!(!app.store.is_pending_delete(&BookmarkId::new("a")));
    }

    #[tokio::test]
    async fn test_form_rejects_invalid_domain() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();

        press(&mut app, KeyCode::Char('a'), &tx);
        type_str(&mut app, "notaurl", &tx);
        press(&mut app, KeyCode::Tab, &tx);
        type_str(&mut app, "Title", &tx);
        press(&mut app, KeyCode::Enter, &tx);

        let form = app.add_form.as_ref().unwrap();
        assert!(!form.saving);
        assert!(form.error.is_some());
        assert_eq!(form.field, FormField::Title);
    }

    #[tokio::test]
    async fn test_form_requires_title() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();

        press(&mut app, KeyCode::Char('a'), &tx);
        type_str(&mut app, "example.com", &tx);
        press(&mut app, KeyCode::Enter, &tx);

        let form = app.add_form.as_ref().unwrap();
        assert!(!form.saving);
        assert!(form.error.as_deref().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn test_form_valid_input_starts_save() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();

        press(&mut app, KeyCode::Char('a'), &tx);
        type_str(&mut app, "example.com", &tx);
        press(&mut app, KeyCode::Tab, &tx);
        type_str(&mut app, "Example", &tx);
        press(&mut app, KeyCode::Enter, &tx);

        let form = app.add_form.as_ref().unwrap();
        assert!(form.saving);
        assert!(form.error.is_none());

        // Typing is ignored while saving; Esc still closes
        press(&mut app, KeyCode::Char('x'), &tx);
        assert_eq!(app.add_form.as_ref().unwrap().title, "Example");
        press(&mut app, KeyCode::Esc, &tx);
        assert!(app.add_form.is_none());
    }

    #[tokio::test]
    async fn test_search_typing_filters_and_esc_clears() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        app.store
            .replace_all(vec![bookmark("a", "Rust", 1), bookmark("b", "Tokio", 2)]);

        press(&mut app, KeyCode::Char('/'), &tx);
        assert!(app.search_mode);
        type_str(&mut app, "rus", &tx);
        assert_eq!(app.visible().len(), 1);

        // Enter keeps the filter applied
        press(&mut app, KeyCode::Enter, &tx);
        assert!(!app.search_mode);
        assert_eq!(app.visible().len(), 1);

        // Esc on the list clears it
        press(&mut app, KeyCode::Esc, &tx);
        assert_eq!(app.visible().len(), 2);
    }

    #[tokio::test]
    async fn test_search_length_capped() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app();
        app.search_mode = true;
        app.search_input = "x".repeat(MAX_SEARCH_QUERY_LENGTH);

        press(&mut app, KeyCode::Char('y'), &tx);
        assert_eq!(app.search_input.len(), MAX_SEARCH_QUERY_LENGTH);
        assert!(app.status_message.is_some());
    }
}
