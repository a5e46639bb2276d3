use crate::app::App;
use crate::model::Bookmark;
use crate::util::{
    display_domain, display_width, favicon_placeholder, format_relative, sanitize_line,
    truncate_to_width,
};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Width reserved for the initial badge, padding and the age column.
const ROW_CHROME: usize = 18;

/// Render the bookmark list panel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let visible = app.visible();
    let now = Utc::now();

    let items: Vec<ListItem> = if visible.is_empty() {
        let hint = if app.store.is_empty() {
            "No bookmarks yet. Press (a) to add one."
        } else {
            "No bookmarks match your search."
        };
        vec![ListItem::new(Span::styled(hint, app.style("empty_hint")))]
    } else {
        let width = area.width.saturating_sub(2) as usize;
        visible
            .iter()
            .enumerate()
            .map(|(i, bookmark)| bookmark_row(app, bookmark, i == app.selected, width, now))
            .collect()
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(app.style("panel_border_focused"))
            .title(format!(" {} ", app.result_summary())),
    );

    let mut state = ListState::default();
    if !visible.is_empty() {
        state.select(Some(app.selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}

/// Two-line row: badge and title, then domain and age.
fn bookmark_row<'a>(
    app: &App,
    bookmark: &'a Bookmark,
    selected: bool,
    width: usize,
    now: DateTime<Utc>,
) -> ListItem<'a> {
    let is_new = app.highlights.is_highlighted(&bookmark.id);
    let title_style = if selected {
        app.style("row_selected")
    } else if is_new {
        app.style("row_new")
    } else {
        app.style("row_title")
    };

    // Titles come from other sessions; never let them reach the terminal raw
    let title = sanitize_line(&bookmark.title);
    let new_tag = if is_new { "  new" } else { "" };
    let max_title = width.saturating_sub(ROW_CHROME + new_tag.len());
    let title = truncate_to_width(&title, max_title).into_owned();

    let mut top = vec![
        Span::styled(
            format!(" {} ", favicon_placeholder(&bookmark.url)),
            app.style("row_initial"),
        ),
        Span::raw(" "),
        Span::styled(title, title_style),
    ];
    if is_new {
        top.push(Span::styled(new_tag, app.style("row_new")));
    }

    let domain = display_domain(&bookmark.url);
    let domain = truncate_to_width(&domain, width.saturating_sub(ROW_CHROME)).into_owned();
    let age = format_relative(bookmark.created_at, now);
    let pad = width
        .saturating_sub(4 + display_width(&domain) + display_width(&age))
        .max(2);

    let bottom = Line::from(vec![
        Span::raw("    "),
        Span::styled(domain, app.style("row_domain")),
        Span::raw(" ".repeat(pad)),
        Span::styled(age, app.style("row_age")),
    ]);

    ListItem::new(vec![Line::from(top), bottom])
}
