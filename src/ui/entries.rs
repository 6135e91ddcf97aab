//! Entry list pane.

use crate::api::{Entry, EntrySource};
use crate::app::{App, Focus, Splitter};
use crate::theme::Role;
use crate::util::{display_width, format_relative_time, truncate_to_width};
use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Age shown next to a title. The detailed form adds the local time.
pub(super) fn entry_age(published: DateTime<Utc>, now: DateTime<Utc>, detailed: bool) -> String {
    let short = format_relative_time(published, now);
    if detailed {
        let local = published.with_timezone(&Local);
        format!("{short} · {}", local.format("%H:%M"))
    } else {
        short
    }
}

fn list_title(app: &App) -> String {
    let content = &app.store.content;
    let name = match content.source {
        EntrySource::Feed(id) => app
            .store
            .data
            .feed(id)
            .map_or_else(|| "Feed".to_string(), |f| f.title.clone()),
        EntrySource::Category(id) => app
            .store
            .data
            .category(id)
            .map_or_else(|| "Category".to_string(), |c| c.title.clone()),
        other => {
            let label = other.label();
            let mut chars = label.chars();
            chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        }
    };
    let mut title = format!(" {name} [{}] ", app.effective_status().as_str());
    if let Some(day) = content.filter_date {
        title.push_str(&format!("on {day} "));
    } else if !content.filter_string.is_empty() {
        title.push_str(&format!("\"{}\" ", content.filter_string));
    }
    if content.loaded {
        title.push_str(&format!("{}/{} ", content.entries.len(), content.total));
    }
    title
}

fn row(app: &App, entry: &Entry, width: usize, now: DateTime<Utc>) -> ListItem<'static> {
    let s = app.settings.get();
    let mut meta = entry_age(entry.published_at, now, s.show_detailed_relative_time);
    if s.show_estimated_reading_time && entry.reading_time > 0 {
        meta.push_str(&format!(" · {}m", entry.reading_time));
    }
    let star = if entry.starred { "★ " } else { "  " };
    let room = width.saturating_sub(display_width(&meta) + 3);
    let title = truncate_to_width(&entry.title, room).into_owned();
    let pad = room.saturating_sub(display_width(&title));

    let title_style = if entry.is_unread() {
        app.styles.get(Role::EntryUnread)
    } else {
        app.styles.get(Role::EntryRead)
    };
    ListItem::new(Line::from(vec![
        Span::styled(star, app.styles.get(Role::Star)),
        Span::styled(title, title_style),
        Span::raw(" ".repeat(pad + 1)),
        Span::styled(meta, app.styles.get(Role::EntryMeta)),
    ]))
}

pub(super) fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let content = &app.store.content;
    let focused = app.focus == Focus::Entries;
    let width = area.width.saturating_sub(3) as usize;
    let now = Utc::now();

    let mut items: Vec<ListItem> = if !content.loaded {
        vec![ListItem::new("Loading...")]
    } else if content.entries.is_empty() {
        vec![ListItem::new("No entries")]
    } else {
        content
            .entries
            .iter()
            .map(|e| row(app, e, width, now))
            .collect()
    };
    if content.loading_more {
        items.push(ListItem::new(Line::styled(
            "Loading more...",
            app.styles.get(Role::EntryMeta),
        )));
    } else if content.loaded && content.has_more() {
        items.push(ListItem::new(Line::styled(
            "[L] load more",
            app.styles.get(Role::EntryMeta),
        )));
    }

    let border_style = if app.drag.is_some_and(|d| d.splitter == Splitter::EntryList) {
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
                .title(list_title(app)),
        )
        .highlight_style(app.styles.get(Role::EntrySelected));

    let selected = (content.loaded && !content.entries.is_empty()).then_some(content.selected);
    let mut state = ListState::default().with_selected(selected);
    f.render_stateful_widget(list, area, &mut state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_age_short_form() {
        let now = DateTime::parse_from_rfc3339("2024-05-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let published = now - chrono::Duration::hours(3);
        assert_eq!(entry_age(published, now, false), "3h");
        assert!(entry_age(published, now, true).starts_with("3h · "));
    }
}
