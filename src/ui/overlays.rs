//! Modal overlays: confirmation, mark-as-read menu, settings, text prompts.

use crate::app::{App, Overlay, SettingsRow};
use crate::store::MarkReadScope;
use crate::theme::Role;
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::render::centered;

fn frame_block<'a>(app: &App, title: &'a str) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(app.styles.get(Role::BorderFocused))
        .title(title)
}

pub(super) fn render(f: &mut Frame, app: &App, overlay: &Overlay) {
    let screen = f.area();
    match overlay {
        Overlay::None | Overlay::Help { .. } => {}
        Overlay::Confirm(action) => {
            let prompt = action.prompt(app.store.content.source);
            let area = centered(56, 5, screen);
            f.render_widget(Clear, area);
            let body = Paragraph::new(vec![
                Line::from(prompt.into_owned()),
                Line::from(Span::styled("[y]es  [n]o", app.styles.get(Role::ReaderMeta))),
            ])
            .wrap(Wrap { trim: true })
            .block(frame_block(app, " Confirm "));
            f.render_widget(body, area);
        }
        Overlay::MarkReadMenu { selected } => {
            let options = MarkReadScope::options_for(app.store.content.source);
            let items: Vec<ListItem> = options.iter().map(|o| ListItem::new(o.label())).collect();
            menu(f, app, " Mark as read ", items, *selected, 36, screen);
        }
        Overlay::Settings { selected } => {
            let items: Vec<ListItem> = SettingsRow::ALL
                .iter()
                .map(|row| {
                    ListItem::new(Line::from(vec![
                        Span::raw(format!("{:<26}", row.label())),
                        Span::styled(app.setting_value(*row), app.styles.get(Role::EntryMeta)),
                    ]))
                })
                .collect();
            menu(f, app, " Settings ", items, *selected, 64, screen);
        }
        Overlay::Input(prompt) => {
            let area = centered(60, 3, screen);
            f.render_widget(Clear, area);
            let title = format!(" {} ", prompt.kind.label());
            let text = format!("{}_", prompt.buffer);
            f.render_widget(
                Paragraph::new(text).block(frame_block(app, &title)),
                area,
            );
        }
    }
}

fn menu(
    f: &mut Frame,
    app: &App,
    title: &str,
    items: Vec<ListItem>,
    selected: usize,
    width: u16,
    screen: Rect,
) {
    let height = u16::try_from(items.len()).unwrap_or(u16::MAX).saturating_add(2);
    let area = centered(width, height, screen);
    f.render_widget(Clear, area);
    let list = List::new(items)
        .block(frame_block(app, title))
        .highlight_style(app.styles.get(Role::EntrySelected));
    let mut state = ListState::default().with_selected(Some(selected));
    f.render_stateful_widget(list, area, &mut state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{ConfirmAction, InputKind, InputPrompt};
    use crate::app::test_support::test_app;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[tokio::test]
    async fn test_confirm_shows_prompt() {
        let (app, _rx) = test_app();
        let overlay = Overlay::Confirm(ConfirmAction::DeleteFeed {
            feed_id: 1,
            title: "Rust Blog".into(),
        });
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &app, &overlay)).unwrap();
        assert!(screen_text(&terminal).contains("Delete feed 'Rust Blog'?"));
    }

    #[tokio::test]
    async fn test_input_prompt_shows_buffer() {
        let (app, _rx) = test_app();
        let overlay = Overlay::Input(InputPrompt {
            kind: InputKind::Search,
            buffer: "tokio".into(),
        });
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &app, &overlay)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Search"));
        assert!(text.contains("tokio_"));
    }
}
