//! Render functions for the TUI.
//!
//! Lays out the header, search line, bookmark list and status bar, then
//! draws any active overlay on top.

use crate::app::{AddForm, App, ConfirmAction, FormField};
use crate::sync::ConnectionState;
use crate::util::{sanitize_line, truncate_to_width};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::{bookmarks, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 40;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Main render dispatch function.
///
/// Handles terminal size validation before rendering.
pub(super) fn render(f: &mut Frame, app: &App) {
    let area = f.area();

    // Guard against zero-width/height to prevent panics
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_search(f, app, chunks[1]);
    bookmarks::render(f, app, chunks[2]);
    status::render(f, app, chunks[3]);

    if let Some(ref confirm) = app.pending_confirm {
        render_confirm_overlay(f, app, confirm);
    }
    if let Some(ref form) = app.add_form {
        render_form_overlay(f, app, form);
    }
}

/// App name and greeting on the left, connection chip on the right.
fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let (chip, chip_role) = match app.connection {
        ConnectionState::Connected => (" Live ", "chip_live"),
        ConnectionState::Connecting => (" Syncing... ", "chip_syncing"),
        ConnectionState::Disconnected => (" Offline ", "chip_offline"),
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(chip.len() as u16)])
        .split(area);

    let greeting = format!("  Hi, {}", sanitize_line(app.user.first_name()));
    let header = Line::from(vec![
        Span::styled(" markvault", app.style("app_name")),
        Span::styled(greeting, app.style("greeting")),
    ]);
    f.render_widget(Paragraph::new(header), chunks[0]);
    f.render_widget(
        Paragraph::new(Span::styled(chip, app.style(chip_role))),
        chunks[1],
    );
}

fn render_search(f: &mut Frame, app: &App, area: Rect) {
    let line = if app.search_mode {
        Span::styled(format!(" Search: {}_", app.search_input), app.style("search_active"))
    } else if !app.search_input.is_empty() {
        Span::styled(format!(" Search: {}", app.search_input), app.style("search_active"))
    } else {
        Span::styled(" Press / to search", app.style("search_idle"))
    };
    f.render_widget(Paragraph::new(line), area);
}

/// Centered rect of at most `width` x `height`, or None if it would be
/// smaller than the minimum.
fn centered(area: Rect, width: u16, height: u16, min_w: u16, min_h: u16) -> Option<Rect> {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay = Rect::new(x, y, width, height);
    (overlay.width >= min_w && overlay.height >= min_h).then_some(overlay)
}

/// Render a confirmation dialog overlay centered on screen.
fn render_confirm_overlay(f: &mut Frame, app: &App, confirm: &ConfirmAction) {
    let text = match confirm {
        ConfirmAction::DeleteBookmark { title, .. } => {
            let title = sanitize_line(title);
            format!(
                "Delete \"{}\"?\n\n(y) Confirm  (n/Esc) Cancel",
                truncate_to_width(&title, 40)
            )
        }
    };

    let Some(overlay) = centered(f.area(), 50, 6, 10, 5) else {
        return;
    };

    f.render_widget(Clear, overlay);

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.style("panel_border_focused"))
                .title(" Confirm "),
        )
        .alignment(Alignment::Center)
        .style(app.style("dialog_body"));

    f.render_widget(paragraph, overlay);
}

/// Render the add-bookmark form overlay centered on screen.
fn render_form_overlay(f: &mut Frame, app: &App, form: &AddForm) {
    let Some(overlay) = centered(f.area(), 64, 10, 30, 8) else {
        return;
    };

    let cursor = |field: FormField| if form.field == field && !form.saving { "_" } else { "" };
    let marker = |field: FormField| if form.field == field { ">" } else { " " };

    let mut lines = vec![
        Line::from(format!("{} URL:   {}{}", marker(FormField::Url), form.url, cursor(FormField::Url))),
        Line::from(format!(
            "{} Title: {}{}",
            marker(FormField::Title),
            form.title,
            cursor(FormField::Title)
        )),
        Line::from(""),
    ];
    match (&form.error, form.saving) {
        (_, true) => lines.push(Line::from("Saving...")),
        (Some(error), false) => lines.push(Line::from(Span::styled(
            error.clone(),
            app.style("form_error"),
        ))),
        (None, false) => lines.push(Line::from("")),
    }
    lines.push(Line::from(""));
    lines.push(Line::from("(Enter) Save  (Tab) Next field  (Esc) Cancel"));

    f.render_widget(Clear, overlay);

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.style("panel_border_focused"))
                .title(" Add Bookmark "),
        )
        .style(app.style("dialog_body"));

    f.render_widget(paragraph, overlay);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{bookmark, test_app};
    use crate::model::BookmarkId;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[tokio::test]
    async fn test_header_and_rows() {
        let mut app = test_app();
        app.store
            .replace_all(vec![bookmark("rust", "The Rust Book", 1)]);
        let screen = draw(&app, 80, 20);
        assert!(screen.contains("Hi, Ada"));
        assert!(screen.contains("Syncing..."));
        assert!(screen.contains("The Rust Book"));
        assert!(screen.contains("rust.example.com"));
        assert!(screen.contains("Your Bookmarks (1)"));
    }

    #[tokio::test]
    async fn test_empty_list_hint() {
        let app = test_app();
        let screen = draw(&app, 80, 20);
        assert!(screen.contains("No bookmarks yet"));
    }

    #[tokio::test]
    async fn test_new_marker_on_highlighted_row() {
        let mut app = test_app();
        app.store.replace_all(vec![bookmark("a", "Fresh", 1)]);
        app.highlights.mark(BookmarkId::new("a"));
        let screen = draw(&app, 80, 20);
        assert!(screen.contains("Fresh  new"));
    }

    #[tokio::test]
    async fn test_confirm_overlay_names_bookmark() {
        let mut app = test_app();
        app.pending_confirm = Some(ConfirmAction::DeleteBookmark {
            id: BookmarkId::new("a"),
            title: "Old link".to_string(),
        });
        let screen = draw(&app, 80, 20);
        assert!(screen.contains("Delete \"Old link\"?"));
    }

    #[tokio::test]
    async fn test_too_small_terminal() {
        let app = test_app();
        let screen = draw(&app, 30, 5);
        assert!(screen.contains("Terminal too small"));
    }
}
