//! Sidebar: fixed sources, then categories with their feeds.

use crate::api::EntrySource;
use crate::app::{App, Focus, SidebarItem};
use crate::theme::Role;
use crate::util::truncate_to_width;
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

fn source_title(source: EntrySource) -> &'static str {
    match source {
        EntrySource::All => "All",
        EntrySource::Today => "Today",
        EntrySource::Starred => "Starred",
        EntrySource::History => "History",
        EntrySource::Feed(_) | EntrySource::Category(_) => "",
    }
}

fn row(app: &App, item: &SidebarItem, current: EntrySource, width: usize) -> ListItem<'static> {
    let (label, count, indent, heading) = match item {
        SidebarItem::Source { source, count } => (source_title(*source).to_string(), *count, 0, false),
        SidebarItem::Category {
            title,
            unread,
            collapsed,
            ..
        } => {
            let marker = if *collapsed { "▸ " } else { "▾ " };
            (format!("{marker}{title}"), *unread, 0, true)
        }
        SidebarItem::Feed {
            title,
            unread,
            has_error,
            ..
        } => {
            let title = if *has_error {
                format!("{title} !")
            } else {
                title.clone()
            };
            (title, *unread, 2, false)
        }
    };

    let count_text = if count > 0 { count.to_string() } else { String::new() };
    let room = width.saturating_sub(indent + count_text.len() + 1);
    let label = truncate_to_width(&label, room).into_owned();
    let pad = room.saturating_sub(crate::util::display_width(&label));

    let label_style = if item.source() == current {
        app.styles.get(Role::SidebarSelected)
    } else if heading {
        app.styles.get(Role::SidebarHeading)
    } else {
        app.styles.get(Role::SidebarItem)
    };

    ListItem::new(Line::from(vec![
        Span::raw(" ".repeat(indent)),
        Span::styled(label, label_style),
        Span::raw(" ".repeat(pad + 1)),
        Span::styled(count_text, app.styles.get(Role::Count)),
    ]))
}

pub(super) fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let focused = app.focus == Focus::Sidebar;
    let inner_width = area.width.saturating_sub(3) as usize;
    let current = app.store.content.source;

    let items: Vec<ListItem> = app
        .sidebar_items()
        .iter()
        .map(|item| row(app, item, current, inner_width))
        .collect();

    let border_style = if app.drag.is_some_and(|d| d.splitter == crate::app::Splitter::Sidebar) {
        app.styles.get(Role::Splitter)
    } else if focused {
        app.styles.get(Role::BorderFocused)
    } else {
        app.styles.get(Role::Border)
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(" Feeds "),
        )
        .highlight_symbol(if focused { ">" } else { " " });

    let mut state = ListState::default().with_selected(Some(app.sidebar_selected));
    f.render_stateful_widget(list, area, &mut state);
}
