//! Layout and render dispatch.

use crate::app::{App, Overlay, PaneLayout, Splitter, UNITS_PER_COLUMN};
use crate::theme::Role;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{entries, help, overlays, reader, sidebar, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Columns always left to the article pane.
const MIN_DETAIL_COLUMNS: u16 = 20;

pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();
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

    let banner_height = u16::from(app.version.has_update);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(banner_height),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    if app.version.has_update {
        render_update_banner(f, app, rows[0]);
    }

    let layout = pane_layout(app, area, rows[1]);
    app.layout = layout;

    sidebar::render(f, app, layout.sidebar);
    entries::render(f, app, layout.entries);
    reader::render(f, app, layout.detail);
    status::render(f, app, rows[2]);

    match &app.overlay {
        Overlay::None => {}
        Overlay::Help { scroll } => help::render(f, app, *scroll),
        overlay => overlays::render(f, app, overlay),
    }
}

/// Splits the main area using the persisted (or dragged) pane widths.
fn pane_layout(app: &App, screen: Rect, main: Rect) -> PaneLayout {
    let to_columns = |units: u32| u16::try_from(units / UNITS_PER_COLUMN).unwrap_or(u16::MAX);
    let budget = main.width.saturating_sub(MIN_DETAIL_COLUMNS);
    let sidebar = to_columns(app.pane_width(Splitter::Sidebar)).min(budget);
    let entries = to_columns(app.pane_width(Splitter::EntryList)).min(budget - sidebar);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(sidebar),
            Constraint::Length(entries),
            Constraint::Min(0),
        ])
        .split(main);

    PaneLayout {
        screen,
        sidebar: cols[0],
        entries: cols[1],
        detail: cols[2],
    }
}

fn render_update_banner(f: &mut Frame, app: &App, area: Rect) {
    let line = Line::from(vec![
        Span::raw(" A new version is available. "),
        Span::raw("[U] view changes  [D] dismiss for a day"),
    ]);
    f.render_widget(
        Paragraph::new(line).style(app.styles.get(Role::Banner)),
        area,
    );
}

/// Rectangle of `width` x `height` centered in `area`, clamped to it.
pub(super) fn centered(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
