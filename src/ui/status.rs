use crate::app::{App, Focus, Overlay};
use crate::theme::Role;
use ratatui::{layout::Rect, widgets::Paragraph, Frame};
use std::borrow::Cow;

/// Hint line shown when no status message is active.
fn hints(app: &App) -> &'static str {
    match &app.overlay {
        Overlay::Input(_) => "Type, ENTER confirm, ESC cancel",
        Overlay::Confirm(_) => "[y]es [n]o",
        Overlay::MarkReadMenu { .. } | Overlay::Settings { .. } => {
            "[j/k] move [ENTER] select [ESC] close"
        }
        Overlay::Help { .. } => "[j/k] scroll [ESC] close",
        Overlay::None => match app.focus {
            Focus::Sidebar => "[ENTER]open [r]efresh [A]mark read [c]rename [d]elete [N]ew category [?]help [q]uit",
            Focus::Entries => "[ENTER]read [m]read [s]tar [/]search [u]nread filter [L]more [?]help [q]uit",
            Focus::Detail => "[j/k]scroll [n/p]next/prev [o]pen [f]etch original [i]summarize [w]save [Esc]back",
        },
    }
}

pub(super) fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let (text, role): (Cow<'_, str>, Role) = match &app.status_message {
        Some((msg, _, true)) => (Cow::Borrowed(msg.as_ref()), Role::StatusError),
        Some((msg, _, false)) => (Cow::Borrowed(msg.as_ref()), Role::StatusBar),
        None if app.summarizing.is_some() => (Cow::Borrowed("Summarizing..."), Role::StatusBar),
        None if app.fetching_original.is_some() => {
            (Cow::Borrowed("Fetching original content..."), Role::StatusBar)
        }
        None => (Cow::Borrowed(hints(app)), Role::StatusBar),
    };

    f.render_widget(Paragraph::new(text).style(app.styles.get(role)), area);
}
