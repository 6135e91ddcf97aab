//! Keyboard and mouse dispatch.
//!
//! Overlays capture input first; otherwise keys go through the
//! keybinding registry in the context of the focused pane.

use crate::app::{
    App, ConfirmAction, Focus, InputKind, Overlay, SettingsRow, SidebarItem, Splitter,
};
use crate::keybindings::{Action as KbAction, Context};
use crate::store::MarkReadScope;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use super::loop_runner::Action;

/// Lines moved per mouse wheel notch in the article pane.
const WHEEL_LINES: usize = 3;

/// Longest text accepted in a prompt.
const MAX_INPUT_CHARS: usize = 512;

/// Handles one key press.
pub(super) fn handle_key(app: &mut App, key: KeyEvent) -> Action {
    match app.overlay.clone() {
        Overlay::None => handle_normal_key(app, key),
        Overlay::Input(mut prompt) => {
            match app
                .keybindings
                .action_for_key(key.code, key.modifiers, Context::Input)
            {
                Some(KbAction::Submit) => {
                    app.overlay = Overlay::None;
                    app.submit_input(prompt);
                }
                Some(KbAction::Cancel) => app.overlay = Overlay::None,
                _ => {
                    match key.code {
                        KeyCode::Backspace => {
                            prompt.buffer.pop();
                        }
                        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                            if prompt.buffer.chars().count() < MAX_INPUT_CHARS {
                                prompt.buffer.push(c);
                            }
                        }
                        _ => {}
                    }
                    app.overlay = Overlay::Input(prompt);
                }
            }
            Action::Continue
        }
        Overlay::Help { scroll } => {
            app.overlay = match key.code {
                KeyCode::Char('j') | KeyCode::Down => Overlay::Help { scroll: scroll + 1 },
                KeyCode::Char('k') | KeyCode::Up => Overlay::Help {
                    scroll: scroll.saturating_sub(1),
                },
                _ => Overlay::None,
            };
            Action::Continue
        }
        Overlay::Confirm(action) => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.overlay = Overlay::None;
                    app.confirm(action);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.overlay = Overlay::None;
                }
                _ => {}
            }
            Action::Continue
        }
        Overlay::MarkReadMenu { selected } => {
            let options = MarkReadScope::options_for(app.store.content.source);
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    app.overlay = Overlay::MarkReadMenu {
                        selected: (selected + 1).min(options.len().saturating_sub(1)),
                    };
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    app.overlay = Overlay::MarkReadMenu {
                        selected: selected.saturating_sub(1),
                    };
                }
                KeyCode::Enter => {
                    app.overlay = match options.get(selected) {
                        Some(scope) => Overlay::Confirm(ConfirmAction::MarkRead(*scope)),
                        None => Overlay::None,
                    };
                }
                KeyCode::Esc | KeyCode::Char('q') => app.overlay = Overlay::None,
                _ => {}
            }
            Action::Continue
        }
        Overlay::Settings { selected } => {
            let last = SettingsRow::ALL.len() - 1;
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    app.overlay = Overlay::Settings {
                        selected: (selected + 1).min(last),
                    };
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    app.overlay = Overlay::Settings {
                        selected: selected.saturating_sub(1),
                    };
                }
                KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('l') | KeyCode::Right => {
                    if let Some(row) = SettingsRow::ALL.get(selected) {
                        app.activate_setting(*row);
                    }
                }
                KeyCode::Char('R') => app.reset_settings(),
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char(',') => {
                    app.overlay = Overlay::None;
                }
                _ => {}
            }
            Action::Continue
        }
    }
}

fn context_for(focus: Focus) -> Context {
    match focus {
        Focus::Sidebar => Context::Sidebar,
        Focus::Entries => Context::Entries,
        Focus::Detail => Context::Detail,
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) -> Action {
    let Some(action) = app
        .keybindings
        .action_for_key(key.code, key.modifiers, context_for(app.focus))
    else {
        return Action::Continue;
    };
    let columns = app.terminal_columns();

    match action {
        KbAction::Quit => return Action::Quit,
        KbAction::NavDown => move_selection(app, 1),
        KbAction::NavUp => move_selection(app, -1),
        KbAction::CycleFocus => {
            app.focus = app.focus.next();
            if app.focus == Focus::Detail && app.store.content.active.is_none() {
                app.focus = app.focus.next();
            }
        }
        KbAction::Back => match app.focus {
            Focus::Detail => app.focus = Focus::Entries,
            Focus::Entries => {
                let content = &app.store.content;
                if content.filter_date.is_some() || !content.filter_string.is_empty() {
                    app.apply_search("");
                } else {
                    app.focus = Focus::Sidebar;
                }
            }
            Focus::Sidebar => {}
        },
        KbAction::Select => match app.focus {
            Focus::Sidebar => {
                if let Some(item) = app.selected_sidebar_item() {
                    app.select_source(item.source());
                }
            }
            Focus::Entries => app.open_selected(),
            Focus::Detail => {}
        },
        KbAction::Reload => {
            app.load_data();
            app.reload_entries();
        }
        KbAction::RefreshFeeds => app.refresh_feeds(),
        KbAction::ToggleRead => app.toggle_status(),
        KbAction::ToggleStar => app.toggle_starred(),
        KbAction::NextArticle => app.open_adjacent(1),
        KbAction::PrevArticle => app.open_adjacent(-1),
        KbAction::OpenInBrowser => app.open_in_browser(),
        KbAction::FetchOriginal => app.fetch_original(),
        KbAction::Summarize => app.summarize(),
        KbAction::SaveEntry => app.save_entry(),
        KbAction::MarkReadMenu => app.open_mark_read_menu(),
        KbAction::LoadMore => app.load_more(),
        KbAction::Search => {
            let content = &app.store.content;
            let current = match content.filter_date {
                Some(day) => day.format("%Y-%m-%d").to_string(),
                None => content.filter_string.clone(),
            };
            app.open_input(InputKind::Search, current);
        }
        KbAction::CycleStatusFilter => app.cycle_status_filter(),
        KbAction::ToggleOrder => app.toggle_order(),
        KbAction::CycleTheme => app.cycle_theme(),
        KbAction::ShowHelp => app.overlay = Overlay::Help { scroll: 0 },
        KbAction::OpenSettings => app.overlay = Overlay::Settings { selected: 0 },
        KbAction::ShrinkPane => app.resize_pane(focused_splitter(app.focus), -1, columns),
        KbAction::GrowPane => app.resize_pane(focused_splitter(app.focus), 1, columns),
        KbAction::NarrowArticle => app.adjust_article_width(-1),
        KbAction::WidenArticle => app.adjust_article_width(1),
        KbAction::DismissUpdate => app.dismiss_update(),
        KbAction::ViewUpdate => app.view_update(),
        KbAction::ExportOpml => app.open_input(InputKind::ExportPath, "fluxread.opml"),
        KbAction::DeleteItem => match app.selected_sidebar_item() {
            Some(SidebarItem::Feed { id, title, .. }) => {
                app.overlay = Overlay::Confirm(ConfirmAction::DeleteFeed { feed_id: id, title });
            }
            Some(SidebarItem::Category { id, title, .. }) => {
                app.overlay = Overlay::Confirm(ConfirmAction::DeleteCategory {
                    category_id: id,
                    title,
                });
            }
            _ => app.set_status("Only feeds and categories can be deleted"),
        },
        KbAction::RenameItem => match app.selected_sidebar_item() {
            Some(SidebarItem::Feed { id, title, .. }) => {
                app.open_input(InputKind::RenameFeed(id), title)
            }
            Some(SidebarItem::Category { id, title, .. }) => {
                app.open_input(InputKind::RenameCategory(id), title)
            }
            _ => app.set_status("Only feeds and categories can be renamed"),
        },
        KbAction::NewCategory => app.open_input(InputKind::NewCategory, ""),
        KbAction::ToggleGroup => {
            if let Some(SidebarItem::Category { id, .. }) = app.selected_sidebar_item() {
                if !app.collapsed.remove(&id) {
                    app.collapsed.insert(id);
                }
                app.clamp_sidebar_selection();
            }
        }
        KbAction::ScrollDown => app.scroll_down(1),
        KbAction::ScrollUp => app.scroll_up(1),
        KbAction::PageDown => app.scroll_down(app.detail_height.max(1)),
        KbAction::PageUp => app.scroll_up(app.detail_height.max(1)),
        KbAction::Submit | KbAction::Cancel => {}
    }
    Action::Continue
}

fn focused_splitter(focus: Focus) -> Splitter {
    match focus {
        Focus::Sidebar => Splitter::Sidebar,
        Focus::Entries | Focus::Detail => Splitter::EntryList,
    }
}

fn move_selection(app: &mut App, step: isize) {
    match app.focus {
        Focus::Sidebar => {
            let len = app.sidebar_items().len();
            if len == 0 {
                return;
            }
            app.sidebar_selected = app
                .sidebar_selected
                .saturating_add_signed(step)
                .min(len - 1);
        }
        Focus::Entries => {
            if step > 0 {
                app.store.content.select_next();
            } else {
                app.store.content.select_prev();
            }
        }
        Focus::Detail if step > 0 => app.scroll_down(1),
        Focus::Detail => app.scroll_up(1),
    }
}

/// Handles a mouse event. Returns true when the screen needs a redraw.
pub(super) fn handle_mouse(app: &mut App, mouse: MouseEvent) -> bool {
    let (column, row) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if app.overlay != Overlay::None {
                return false;
            }
            if app.begin_drag(column, row) {
                return true;
            }
            let hit = |r: ratatui::layout::Rect| {
                column >= r.x && column < r.x + r.width && row >= r.y && row < r.y + r.height
            };
            let layout = app.layout;
            let focus = if hit(layout.sidebar) {
                Focus::Sidebar
            } else if hit(layout.entries) {
                Focus::Entries
            } else if hit(layout.detail) && app.store.content.active.is_some() {
                Focus::Detail
            } else {
                return false;
            };
            app.focus = focus;
            true
        }
        MouseEventKind::Drag(MouseButton::Left) if app.drag.is_some() => {
            let columns = app.terminal_columns();
            app.update_drag(column, columns);
            true
        }
        MouseEventKind::Up(MouseButton::Left) if app.drag.is_some() => {
            app.end_drag();
            true
        }
        MouseEventKind::ScrollDown if app.focus == Focus::Detail => {
            app.scroll_down(WHEEL_LINES);
            true
        }
        MouseEventKind::ScrollUp if app.focus == Focus::Detail => {
            app.scroll_up(WHEEL_LINES);
            true
        }
        _ => false,
    }
}
