//! Keybinding registry: maps actions to key events, with config overrides.
//!
//! Defaults live in one table; `config.toml` can rebind any action by name
//! (`[keybindings] toggle_star = "x"`). Lookups try the focused pane's
//! context first and fall back to global bindings.

use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

/// Everything a key can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    NavDown,
    NavUp,
    CycleFocus,
    Back,
    Select,
    Reload,
    RefreshFeeds,
    ToggleRead,
    ToggleStar,
    NextArticle,
    PrevArticle,
    OpenInBrowser,
    FetchOriginal,
    Summarize,
    SaveEntry,
    MarkReadMenu,
    LoadMore,
    Search,
    CycleStatusFilter,
    ToggleOrder,
    CycleTheme,
    ShowHelp,
    OpenSettings,
    ShrinkPane,
    GrowPane,
    NarrowArticle,
    WidenArticle,
    DismissUpdate,
    ViewUpdate,
    ExportOpml,
    DeleteItem,
    RenameItem,
    NewCategory,
    ToggleGroup,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    Submit,
    Cancel,
}

impl Action {
    /// Text shown in the help overlay.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Quit => "Quit",
            Self::NavDown => "Move down",
            Self::NavUp => "Move up",
            Self::CycleFocus => "Next pane",
            Self::Back => "Back / close article",
            Self::Select => "Open",
            Self::Reload => "Reload list and counters",
            Self::RefreshFeeds => "Refresh feeds on the server",
            Self::ToggleRead => "Toggle read / unread",
            Self::ToggleStar => "Toggle star",
            Self::NextArticle => "Next article",
            Self::PrevArticle => "Previous article",
            Self::OpenInBrowser => "Open link in browser",
            Self::FetchOriginal => "Fetch original content",
            Self::Summarize => "Summarize with AI",
            Self::SaveEntry => "Save to third-party services",
            Self::MarkReadMenu => "Mark as read...",
            Self::LoadMore => "Load more entries",
            Self::Search => "Search (YYYY-MM-DD filters by day)",
            Self::CycleStatusFilter => "Cycle unread / all / starred",
            Self::ToggleOrder => "Toggle sort direction",
            Self::CycleTheme => "Cycle theme mode",
            Self::ShowHelp => "Show help",
            Self::OpenSettings => "Settings",
            Self::ShrinkPane => "Shrink focused pane",
            Self::GrowPane => "Grow focused pane",
            Self::NarrowArticle => "Narrow article text",
            Self::WidenArticle => "Widen article text",
            Self::DismissUpdate => "Dismiss update notice",
            Self::ViewUpdate => "View latest changes",
            Self::ExportOpml => "Export OPML",
            Self::DeleteItem => "Delete feed / category",
            Self::RenameItem => "Rename feed / category",
            Self::NewCategory => "New category",
            Self::ToggleGroup => "Collapse / expand category",
            Self::ScrollDown => "Scroll down",
            Self::ScrollUp => "Scroll up",
            Self::PageDown => "Page down",
            Self::PageUp => "Page up",
            Self::Submit => "Submit",
            Self::Cancel => "Cancel",
        }
    }
}

/// Dispatch context; determines which bindings are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Global,
    Sidebar,
    Entries,
    Detail,
    Input,
}

impl Context {
    pub fn title(self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Sidebar => "Sidebar",
            Self::Entries => "Entry list",
            Self::Detail => "Article",
            Self::Input => "Prompts",
        }
    }
}

/// A key event: code + modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn char(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}

const DEFAULT_BINDINGS: &[(Context, KeySpec, Action)] = &[
    (Context::Global, KeySpec::char('q'), Action::Quit),
    (Context::Global, KeySpec::char('j'), Action::NavDown),
    (Context::Global, KeySpec::plain(KeyCode::Down), Action::NavDown),
    (Context::Global, KeySpec::char('k'), Action::NavUp),
    (Context::Global, KeySpec::plain(KeyCode::Up), Action::NavUp),
    (Context::Global, KeySpec::plain(KeyCode::Tab), Action::CycleFocus),
    (Context::Global, KeySpec::plain(KeyCode::Esc), Action::Back),
    (Context::Global, KeySpec::plain(KeyCode::Enter), Action::Select),
    (Context::Global, KeySpec::char('R'), Action::Reload),
    (Context::Global, KeySpec::char('r'), Action::RefreshFeeds),
    (Context::Global, KeySpec::char('m'), Action::ToggleRead),
    (Context::Global, KeySpec::char('s'), Action::ToggleStar),
    (Context::Global, KeySpec::char('n'), Action::NextArticle),
    (Context::Global, KeySpec::char('p'), Action::PrevArticle),
    (Context::Global, KeySpec::char('o'), Action::OpenInBrowser),
    (Context::Global, KeySpec::char('f'), Action::FetchOriginal),
    (Context::Global, KeySpec::char('i'), Action::Summarize),
    (Context::Global, KeySpec::char('w'), Action::SaveEntry),
    (Context::Global, KeySpec::char('A'), Action::MarkReadMenu),
    (Context::Global, KeySpec::char('L'), Action::LoadMore),
    (Context::Global, KeySpec::char('/'), Action::Search),
    (Context::Global, KeySpec::char('u'), Action::CycleStatusFilter),
    (Context::Global, KeySpec::char('O'), Action::ToggleOrder),
    (Context::Global, KeySpec::char('T'), Action::CycleTheme),
    (Context::Global, KeySpec::char('?'), Action::ShowHelp),
    (Context::Global, KeySpec::char(','), Action::OpenSettings),
    (Context::Global, KeySpec::char('<'), Action::ShrinkPane),
    (Context::Global, KeySpec::char('>'), Action::GrowPane),
    (Context::Global, KeySpec::char('-'), Action::NarrowArticle),
    (Context::Global, KeySpec::char('='), Action::WidenArticle),
    (Context::Global, KeySpec::char('D'), Action::DismissUpdate),
    (Context::Global, KeySpec::char('U'), Action::ViewUpdate),
    (Context::Global, KeySpec::char('e'), Action::ExportOpml),
    (Context::Sidebar, KeySpec::char('d'), Action::DeleteItem),
    (Context::Sidebar, KeySpec::char('c'), Action::RenameItem),
    (Context::Sidebar, KeySpec::char('N'), Action::NewCategory),
    (Context::Sidebar, KeySpec::char(' '), Action::ToggleGroup),
    (Context::Detail, KeySpec::char('j'), Action::ScrollDown),
    (Context::Detail, KeySpec::plain(KeyCode::Down), Action::ScrollDown),
    (Context::Detail, KeySpec::char('k'), Action::ScrollUp),
    (Context::Detail, KeySpec::plain(KeyCode::Up), Action::ScrollUp),
    (Context::Detail, KeySpec::ctrl('d'), Action::PageDown),
    (Context::Detail, KeySpec::char(' '), Action::PageDown),
    (Context::Detail, KeySpec::ctrl('u'), Action::PageUp),
    (Context::Input, KeySpec::plain(KeyCode::Enter), Action::Submit),
    (Context::Input, KeySpec::plain(KeyCode::Esc), Action::Cancel),
];

/// Parses a key string from config.
///
/// Accepts single characters (`q`, `/`), named keys (`Enter`, `Esc`, `Tab`,
/// arrows, `Backspace`, `Space`), `Ctrl+<char>` and `F1`..`F12`.
fn parse_key_string(s: &str) -> Option<KeySpec> {
    let s = s.trim();

    if let Some(rest) = s.strip_prefix("Ctrl+") {
        let mut chars = rest.trim().chars();
        let c = chars.next()?;
        return chars.next().is_none().then(|| KeySpec::ctrl(c));
    }

    let named = match s.to_lowercase().as_str() {
        "enter" | "return" => Some(KeyCode::Enter),
        "esc" | "escape" => Some(KeyCode::Esc),
        "tab" => Some(KeyCode::Tab),
        "up" => Some(KeyCode::Up),
        "down" => Some(KeyCode::Down),
        "left" => Some(KeyCode::Left),
        "right" => Some(KeyCode::Right),
        "backspace" => Some(KeyCode::Backspace),
        "space" => Some(KeyCode::Char(' ')),
        _ => None,
    };
    if let Some(code) = named {
        return Some(KeySpec::plain(code));
    }

    if let Some(n) = s
        .strip_prefix(['F', 'f'])
        .and_then(|rest| rest.parse::<u8>().ok())
    {
        return (1..=12).contains(&n).then(|| KeySpec::plain(KeyCode::F(n)));
    }

    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then(|| KeySpec::char(c))
}

/// Formats a key for the help overlay.
fn format_key(key: &KeySpec) -> String {
    let prefix = if key.modifiers.contains(KeyModifiers::CONTROL) {
        "Ctrl+"
    } else {
        ""
    };
    let name = match key.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        _ => "?".to_string(),
    };
    format!("{prefix}{name}")
}

/// Parses an action name from config (`toggle_star`, `nav_down`, ...).
fn parse_action_name(name: &str) -> Option<Action> {
    let action = match name.trim().to_lowercase().replace('-', "_").as_str() {
        "quit" => Action::Quit,
        "nav_down" | "down" => Action::NavDown,
        "nav_up" | "up" => Action::NavUp,
        "cycle_focus" => Action::CycleFocus,
        "back" => Action::Back,
        "select" | "open" => Action::Select,
        "reload" => Action::Reload,
        "refresh" | "refresh_feeds" => Action::RefreshFeeds,
        "toggle_read" | "read" => Action::ToggleRead,
        "toggle_star" | "star" => Action::ToggleStar,
        "next_article" | "next" => Action::NextArticle,
        "prev_article" | "previous" | "prev" => Action::PrevArticle,
        "open_in_browser" | "browser" => Action::OpenInBrowser,
        "fetch_original" => Action::FetchOriginal,
        "summarize" => Action::Summarize,
        "save_entry" | "save" => Action::SaveEntry,
        "mark_read_menu" | "mark_all_read" => Action::MarkReadMenu,
        "load_more" => Action::LoadMore,
        "search" => Action::Search,
        "cycle_status_filter" | "status_filter" => Action::CycleStatusFilter,
        "toggle_order" => Action::ToggleOrder,
        "cycle_theme" | "theme" => Action::CycleTheme,
        "show_help" | "help" => Action::ShowHelp,
        "open_settings" | "settings" => Action::OpenSettings,
        "shrink_pane" => Action::ShrinkPane,
        "grow_pane" => Action::GrowPane,
        "narrow_article" => Action::NarrowArticle,
        "widen_article" => Action::WidenArticle,
        "dismiss_update" => Action::DismissUpdate,
        "view_update" => Action::ViewUpdate,
        "export_opml" | "export" => Action::ExportOpml,
        "delete_item" | "delete" => Action::DeleteItem,
        "rename_item" | "rename" => Action::RenameItem,
        "new_category" => Action::NewCategory,
        "toggle_group" => Action::ToggleGroup,
        "scroll_down" => Action::ScrollDown,
        "scroll_up" => Action::ScrollUp,
        "page_down" => Action::PageDown,
        "page_up" => Action::PageUp,
        "submit" => Action::Submit,
        "cancel" => Action::Cancel,
        _ => return None,
    };
    Some(action)
}

/// Context-aware key → action lookup.
pub struct KeybindingRegistry {
    lookup: HashMap<(Context, KeySpec), Action>,
    /// In registration order, for the help overlay.
    bindings: Vec<(Context, KeySpec, Action)>,
}

impl KeybindingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            lookup: HashMap::with_capacity(DEFAULT_BINDINGS.len()),
            bindings: Vec::with_capacity(DEFAULT_BINDINGS.len()),
        };
        for &(context, key, action) in DEFAULT_BINDINGS {
            registry.bind(context, key, action);
        }
        registry
    }

    fn bind(&mut self, context: Context, key: KeySpec, action: Action) {
        self.lookup.insert((context, key), action);
        self.bindings.push((context, key, action));
    }

    /// Applies `[keybindings]` overrides (action name → key string).
    ///
    /// The new key replaces every default key of that action, in the same
    /// contexts. Returns one warning per entry that could not be applied.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> Vec<String> {
        let mut warnings = Vec::new();

        for (action_name, key_str) in overrides {
            let Some(action) = parse_action_name(action_name) else {
                warnings.push(format!("Unknown action '{action_name}', ignoring"));
                continue;
            };
            let Some(key) = parse_key_string(key_str) else {
                warnings.push(format!(
                    "Cannot parse key '{key_str}' for action '{action_name}', ignoring"
                ));
                continue;
            };

            let mut contexts: Vec<Context> = Vec::new();
            for (ctx, _, a) in &self.bindings {
                if *a == action && !contexts.contains(ctx) {
                    contexts.push(*ctx);
                }
            }

            self.lookup.retain(|_, a| *a != action);
            self.bindings.retain(|(_, _, a)| *a != action);
            for context in contexts {
                self.bind(context, key, action);
            }

            tracing::info!(action = %action_name, key = %key_str, "Applied keybinding override");
        }

        warnings
    }

    /// Looks up `code`/`modifiers` in `context`, falling back to global bindings.
    ///
    /// Shift is ignored so that `A` matches whether or not the terminal
    /// reports the modifier.
    pub fn action_for_key(
        &self,
        code: KeyCode,
        modifiers: KeyModifiers,
        context: Context,
    ) -> Option<Action> {
        let key = KeySpec::new(code, modifiers - KeyModifiers::SHIFT);
        self.lookup.get(&(context, key)).copied().or_else(|| {
            (context != Context::Global && context != Context::Input)
                .then(|| self.lookup.get(&(Context::Global, key)).copied())
                .flatten()
        })
    }

    /// (context, key label, description) rows for the help overlay.
    pub fn help_rows(&self) -> Vec<(Context, String, &'static str)> {
        self.bindings
            .iter()
            .map(|(ctx, key, action)| (*ctx, format_key(key), action.describe()))
            .collect()
    }
}

impl Default for KeybindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
