//! Help overlay: scrollable keybinding table.
//!
//! Shows the live bindings, user overrides from `config.toml` included,
//! grouped by the pane they apply to.

use crate::app::App;
use crate::keybindings::Context;
use crate::theme::Role;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table},
    Frame,
};

const CONTEXT_ORDER: [Context; 5] = [
    Context::Global,
    Context::Sidebar,
    Context::Entries,
    Context::Detail,
    Context::Input,
];

/// Table rows: a heading per context followed by its bindings.
pub(super) fn help_lines(app: &App) -> Vec<(String, String, bool)> {
    let bindings = app.keybindings.help_rows();
    let mut lines = Vec::new();
    for ctx in CONTEXT_ORDER {
        let group: Vec<_> = bindings.iter().filter(|(c, _, _)| *c == ctx).collect();
        if group.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push((String::new(), String::new(), false));
        }
        lines.push((format!("-- {} --", ctx.title()), String::new(), true));
        for (_, key, description) in group {
            lines.push((format!("  {key}"), (*description).to_string(), false));
        }
    }
    lines
}

pub(super) fn render(f: &mut Frame, app: &App, scroll: usize) {
    let area = f.area();
    let overlay = centered_rect(80, 80, area);
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }
    f.render_widget(Clear, overlay);

    let lines = help_lines(app);
    let visible_height = overlay.height.saturating_sub(3) as usize;
    let max_scroll = lines.len().saturating_sub(visible_height);
    let scroll = scroll.min(max_scroll);

    let rows: Vec<Row> = lines
        .into_iter()
        .skip(scroll)
        .take(visible_height)
        .map(|(key, description, heading)| {
            if heading {
                Row::new(vec![
                    Line::from(Span::styled(key, Style::default().add_modifier(Modifier::BOLD))),
                    Line::from(""),
                ])
                .style(app.styles.get(Role::ReaderHeading))
            } else {
                Row::new(vec![key, description])
            }
        })
        .collect();

    let title = if max_scroll > 0 {
        format!(" Help ({}/{}) ", scroll + 1, max_scroll + 1)
    } else {
        " Help (? to close) ".to_string()
    };

    let table = Table::new(rows, [Constraint::Length(16), Constraint::Min(20)])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.styles.get(Role::BorderFocused))
                .title(title),
        )
        .header(
            Row::new(vec!["Key", "Action"])
                .style(
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .add_modifier(Modifier::UNDERLINED),
                )
                .bottom_margin(1),
        )
        .style(app.styles.get(Role::ReaderBody));
    f.render_widget(table, overlay);

    if scroll < max_scroll {
        let hint = Line::from(Span::styled(
            " j/k to scroll, ? or Esc to close ",
            app.styles.get(Role::ReaderMeta),
        ));
        let hint_area = Rect {
            x: overlay.x + 1,
            y: overlay.y + overlay.height.saturating_sub(1),
            width: overlay.width.saturating_sub(2),
            height: 1,
        };
        f.render_widget(Paragraph::new(hint), hint_area);
    }
}

/// Rectangle covering the given percentage of `area`, centered.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    super::render::centered(width, height, area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::test_app;

    #[tokio::test]
    async fn test_help_groups_start_with_global() {
        let (app, _rx) = test_app();
        let lines = help_lines(&app);
        assert_eq!(lines[0].0, "-- Global --");
        assert!(lines.iter().any(|(_, d, _)| d == "Quit"));
        assert!(lines.iter().any(|(k, _, h)| *h && k == "-- Article --"));
    }
}
