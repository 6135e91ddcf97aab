//! Article pane.
//!
//! Entry HTML is reduced to blocks by [`html_to_blocks`] and word-wrapped
//! here to the configured article width, so the line count used for scroll
//! clamping is exactly what gets drawn.

use crate::api::Entry;
use crate::app::{App, Focus};
use crate::theme::Role;
use crate::util::{display_width, html_to_blocks, Block as ContentBlock};
use chrono::Local;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// Greedy word wrap by display width. Words longer than `width` are split.
pub(super) fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0;
        for word in paragraph.split_whitespace() {
            let word_width = display_width(word);
            if line_width > 0 && line_width + 1 + word_width > width {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }
            if word_width > width {
                for c in word.chars() {
                    let w = c.width().unwrap_or(0);
                    if line_width + w > width {
                        lines.push(std::mem::take(&mut line));
                        line_width = 0;
                    }
                    line.push(c);
                    line_width += w;
                }
                continue;
            }
            if line_width > 0 {
                line.push(' ');
                line_width += 1;
            }
            line.push_str(word);
            line_width += word_width;
        }
        lines.push(line);
    }
    lines
}

/// Preformatted text keeps its spacing; long lines are cut, not wrapped.
fn preformatted(text: &str, width: usize) -> Vec<String> {
    text.lines()
        .map(|l| crate::util::truncate_to_width(l, width).into_owned())
        .collect()
}

/// Every line of the article at `width` columns: header, then body blocks.
pub(super) fn article_lines(app: &App, entry: &Entry, width: usize) -> Vec<Line<'static>> {
    let styles = &app.styles;
    let mut lines: Vec<Line<'static>> = Vec::new();
    let push_wrapped = |lines: &mut Vec<Line<'static>>, text: &str, prefix: &str, style: Style| {
        let inner = width.saturating_sub(display_width(prefix));
        for l in wrap_text(text, inner) {
            lines.push(Line::from(vec![
                Span::styled(prefix.to_string(), style),
                Span::styled(l, style),
            ]));
        }
    };

    push_wrapped(&mut lines, &entry.title, "", styles.get(Role::ReaderHeading));
    let mut meta = entry.feed_title().to_string();
    if !entry.author.is_empty() {
        meta.push_str(&format!(" · {}", entry.author));
    }
    meta.push_str(&format!(
        " · {}",
        entry.published_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    ));
    if app.settings.get().show_estimated_reading_time && entry.reading_time > 0 {
        meta.push_str(&format!(" · {} min read", entry.reading_time));
    }
    push_wrapped(&mut lines, &meta, "", styles.get(Role::ReaderMeta));
    lines.push(Line::from(""));

    let blocks = html_to_blocks(&entry.content);
    if blocks.is_empty() {
        lines.push(Line::styled("(no content)", styles.get(Role::ReaderMeta)));
    }
    for block in blocks {
        match block {
            ContentBlock::Heading(text) => {
                push_wrapped(&mut lines, &text, "", styles.get(Role::ReaderHeading))
            }
            ContentBlock::Paragraph(text) => {
                push_wrapped(&mut lines, &text, "", styles.get(Role::ReaderBody))
            }
            ContentBlock::ListItem(text) => {
                push_wrapped(&mut lines, &text, "• ", styles.get(Role::ReaderBody))
            }
            ContentBlock::Quote(text) => {
                push_wrapped(&mut lines, &text, "│ ", styles.get(Role::ReaderQuote))
            }
            ContentBlock::Preformatted(text) => {
                for l in preformatted(&text, width) {
                    lines.push(Line::styled(l, styles.get(Role::ReaderCode)));
                }
            }
            ContentBlock::Image { alt, src } => {
                let label = if alt.is_empty() { src } else { alt };
                push_wrapped(&mut lines, &format!("[image: {label}]"), "", styles.get(Role::ReaderImage))
            }
        }
        lines.push(Line::from(""));
    }
    lines
}

pub(super) fn render(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let focused = app.focus == Focus::Detail;
    let border_style = if focused {
        app.styles.get(Role::BorderFocused)
    } else {
        app.styles.get(Role::Border)
    };

    let mut title = " Article ".to_string();
    let active_id = app.store.content.active.as_ref().map(|e| e.id);
    if active_id.is_some() && app.summarizing == active_id {
        title = " Article (summarizing...) ".to_string();
    } else if active_id.is_some() && app.fetching_original == active_id {
        title = " Article (fetching original...) ".to_string();
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(entry) = app.store.content.active.as_ref() else {
        app.detail_lines = 0;
        app.detail_height = inner.height as usize;
        app.detail_scroll = 0;
        f.render_widget(
            Paragraph::new("Select an entry to read it here").style(app.styles.get(Role::ReaderMeta)),
            inner,
        );
        return;
    };

    let percent = u32::from(inner.width) * app.settings.get().article_width / 100;
    let text_width = u16::try_from(percent).unwrap_or(inner.width).clamp(1, inner.width);
    let lines = article_lines(app, entry, text_width as usize);

    app.detail_lines = lines.len();
    app.detail_height = inner.height as usize;
    let max_scroll = app.detail_lines.saturating_sub(app.detail_height);
    app.detail_scroll = app.detail_scroll.min(max_scroll);

    let text_area = Rect {
        x: inner.x + (inner.width - text_width) / 2,
        y: inner.y,
        width: text_width,
        height: inner.height,
    };
    let scroll = u16::try_from(app.detail_scroll).unwrap_or(u16::MAX);
    f.render_widget(Paragraph::new(lines).scroll((scroll, 0)), text_area);
}
