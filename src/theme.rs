//! Semantic color roles for the TUI.
//!
//! Widgets ask for a role by name (`app.style("row_selected")`) instead of
//! hardcoding colors, so the palette lives in one place.

use ratatui::style::{Color, Modifier, Style};
use std::collections::HashMap;

/// Every role the renderer uses, with its style.
#[derive(Debug, Clone)]
pub struct Palette {
    styles: HashMap<&'static str, Style>,
}

impl Palette {
    pub fn dark() -> Self {
        let styles = HashMap::from([
            // Header
            ("app_name", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            ("greeting", Style::default().fg(Color::Gray)),
            ("chip_live", Style::default().fg(Color::Black).bg(Color::Green)),
            ("chip_syncing", Style::default().fg(Color::Black).bg(Color::Yellow)),
            ("chip_offline", Style::default().fg(Color::White).bg(Color::Red)),
            // Search + summary
            ("search_active", Style::default().fg(Color::Yellow)),
            ("search_idle", Style::default().fg(Color::DarkGray)),
            ("summary", Style::default().add_modifier(Modifier::BOLD)),
            // Bookmark rows
            ("row_title", Style::default()),
            ("row_selected", Style::default().bg(Color::DarkGray).fg(Color::White)),
            ("row_new", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            ("row_initial", Style::default().fg(Color::Black).bg(Color::Blue)),
            ("row_domain", Style::default().fg(Color::Cyan)),
            ("row_age", Style::default().fg(Color::DarkGray)),
            ("empty_hint", Style::default().fg(Color::DarkGray)),
            // Chrome
            ("status_bar", Style::default().bg(Color::DarkGray).fg(Color::White)),
            ("panel_border", Style::default()),
            ("panel_border_focused", Style::default().fg(Color::Cyan)),
            ("dialog_body", Style::default()),
            ("form_error", Style::default().fg(Color::Red)),
        ]);
        Self { styles }
    }

    /// Style for `role`; unknown roles get the terminal default.
    pub fn style(&self, role: &str) -> Style {
        self.styles.get(role).copied().unwrap_or_default()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::dark()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_roles_resolve() {
        let palette = Palette::dark();
        assert_eq!(palette.style("row_new").fg, Some(Color::Green));
        assert_ne!(palette.style("chip_live"), palette.style("chip_offline"));
    }

    #[test]
    fn test_unknown_role_returns_default() {
        assert_eq!(Palette::dark().style("no_such_role"), Style::default());
    }
}
