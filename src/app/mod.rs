//! Application state and the events background tasks report back with.
//!
//! [`App`] is owned by the event loop. Network work runs in spawned tasks
//! (see [`flows`]) that send an [`AppEvent`] when done; only
//! [`App::handle_event`] applies those results, so every state change
//! happens on the loop.

mod events;
mod flows;
mod tasks;

pub use tasks::catch_task_panic;

use crate::ai::{AiClient, AiProvider, ModelOption};
use crate::api::{
    Category, Counters, EntriesPage, Entry, EntrySource, Feed, MinifluxClient, OriginalContent,
};
use crate::keybindings::KeybindingRegistry;
use crate::settings::{
    SettingsStore, ShowStatus, ENTRY_LIST_WIDTH_MAX, ENTRY_LIST_WIDTH_MIN, SIDEBAR_WIDTH_MAX,
    SIDEBAR_WIDTH_MIN,
};
use crate::store::{MarkReadScope, StarChange, StatusChange, Store};
use crate::theme::{accent_color, StyleMap, ThemeVariant};
use crate::version::{UpdateDecision, VersionChecker, VersionState};
use chrono::{DateTime, Utc};
use lru::LruCache;
use ratatui::layout::Rect;
use std::borrow::Cow;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Summaries kept per entry so re-opening an article does not call the provider again.
const SUMMARY_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// A cached summary is only reused for the same entry, provider and model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    pub entry_id: i64,
    pub provider: AiProvider,
    pub model: String,
}

/// Status messages disappear after this long.
const STATUS_TTL: Duration = Duration::from_secs(4);

/// Persisted pane widths are in pixel-like units; one terminal column is this many.
pub const UNITS_PER_COLUMN: u32 = 8;

/// Units kept free for the detail pane when the entry list grows
/// (its minimum plus the splitter).
const DETAIL_RESERVE_UNITS: u32 = 320 + 8;

/// Keyboard resize step in units.
pub const RESIZE_STEP_UNITS: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Entries,
    Detail,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Sidebar => Focus::Entries,
            Focus::Entries => Focus::Detail,
            Focus::Detail => Focus::Sidebar,
        }
    }
}

/// Destructive or bulk actions waiting for y/n.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmAction {
    MarkRead(MarkReadScope),
    DeleteFeed { feed_id: i64, title: String },
    DeleteCategory { category_id: i64, title: String },
}

impl ConfirmAction {
    pub fn prompt(&self, source: EntrySource) -> Cow<'static, str> {
        match self {
            ConfirmAction::MarkRead(scope) => Cow::Borrowed(scope.confirm_prompt(source)),
            ConfirmAction::DeleteFeed { title, .. } => format!("Delete feed '{title}'?").into(),
            ConfirmAction::DeleteCategory { title, .. } => {
                format!("Delete category '{title}' and its feeds?").into()
            }
        }
    }
}

/// What a text prompt is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Search,
    RenameFeed(i64),
    RenameCategory(i64),
    NewCategory,
    AiKey,
    ExportPath,
}

impl InputKind {
    pub fn label(self) -> &'static str {
        match self {
            InputKind::Search => "Search",
            InputKind::RenameFeed(_) => "Feed title",
            InputKind::RenameCategory(_) => "Category title",
            InputKind::NewCategory => "New category",
            InputKind::AiKey => "API key / server URL",
            InputKind::ExportPath => "Export OPML to",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPrompt {
    pub kind: InputKind,
    pub buffer: String,
}

/// Rows of the settings overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsRow {
    AiProvider,
    AiKey,
    AiModel,
    ThemeMode,
    ThemeColor,
    HomePage,
    OrderBy,
    PageSize,
    RemoveDuplicates,
    MarkReadBy,
    ShowReadingTime,
    ShowHiddenFeeds,
    UnreadFeedsOnly,
    DetailedRelativeTime,
}

impl SettingsRow {
    pub const ALL: [SettingsRow; 14] = [
        SettingsRow::AiProvider,
        SettingsRow::AiKey,
        SettingsRow::AiModel,
        SettingsRow::ThemeMode,
        SettingsRow::ThemeColor,
        SettingsRow::HomePage,
        SettingsRow::OrderBy,
        SettingsRow::PageSize,
        SettingsRow::RemoveDuplicates,
        SettingsRow::MarkReadBy,
        SettingsRow::ShowReadingTime,
        SettingsRow::ShowHiddenFeeds,
        SettingsRow::UnreadFeedsOnly,
        SettingsRow::DetailedRelativeTime,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsRow::AiProvider => "AI provider",
            SettingsRow::AiKey => "API key / server URL",
            SettingsRow::AiModel => "AI model",
            SettingsRow::ThemeMode => "Theme mode",
            SettingsRow::ThemeColor => "Accent color",
            SettingsRow::HomePage => "Home page",
            SettingsRow::OrderBy => "Order by",
            SettingsRow::PageSize => "Page size",
            SettingsRow::RemoveDuplicates => "Remove duplicates",
            SettingsRow::MarkReadBy => "Mark read",
            SettingsRow::ShowReadingTime => "Show reading time",
            SettingsRow::ShowHiddenFeeds => "Show hidden feeds",
            SettingsRow::UnreadFeedsOnly => "Unread feeds only",
            SettingsRow::DetailedRelativeTime => "Detailed relative time",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    None,
    Help { scroll: usize },
    Confirm(ConfirmAction),
    MarkReadMenu { selected: usize },
    Settings { selected: usize },
    Input(InputPrompt),
}

/// One row of the sidebar.
#[derive(Debug, Clone, PartialEq)]
pub enum SidebarItem {
    Source { source: EntrySource, count: i64 },
    Category { id: i64, title: String, unread: i64, collapsed: bool },
    Feed { id: i64, title: String, unread: i64, has_error: bool },
}

impl SidebarItem {
    pub fn source(&self) -> EntrySource {
        match self {
            SidebarItem::Source { source, .. } => *source,
            SidebarItem::Category { id, .. } => EntrySource::Category(*id),
            SidebarItem::Feed { id, .. } => EntrySource::Feed(*id),
        }
    }
}

/// A resizable pane edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splitter {
    Sidebar,
    EntryList,
}

/// Mouse drag in progress on a splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drag {
    pub splitter: Splitter,
    pub start_column: u16,
    pub start_width: u32,
    pub current_width: u32,
}

/// Where panes were drawn in the last frame; used for mouse hit-testing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaneLayout {
    pub screen: Rect,
    pub sidebar: Rect,
    pub entries: Rect,
    pub detail: Rect,
}

/// Everything loaded once at startup and on full reloads.
#[derive(Debug, Clone, Default)]
pub struct InitialData {
    pub feeds: Vec<Feed>,
    pub categories: Vec<Category>,
    pub counters: Counters,
    pub unread_today: u64,
    pub history: u64,
    pub starred: u64,
    pub user_id: i64,
    pub has_integrations: bool,
}

/// Events from background tasks.
#[derive(Debug)]
pub enum AppEvent {
    DataLoaded(Result<Box<InitialData>, String>),
    CountersLoaded(Counters),
    EntriesLoaded {
        generation: u64,
        append: bool,
        result: Result<EntriesPage, String>,
    },
    /// The server rejected a status change; undo it.
    StatusUpdateFailed { change: StatusChange, error: String },
    StarToggleFailed { change: StarChange, error: String },
    /// Bulk mark-as-read reached the server; `counters` are fresh.
    BulkMarkDone {
        cutoff: Option<DateTime<Utc>>,
        result: Result<Counters, String>,
    },
    OriginalContentLoaded {
        entry_id: i64,
        result: Result<OriginalContent, String>,
    },
    SummaryReady {
        key: SummaryKey,
        result: Result<String, String>,
    },
    ModelsLoaded {
        generation: u64,
        provider: AiProvider,
        models: Vec<ModelOption>,
    },
    VersionChecked {
        generation: u64,
        decision: Option<UpdateDecision>,
    },
    /// A feed or category changed on the server; reload feeds and counters.
    FeedsChanged { message: String },
    Notice(Cow<'static, str>),
    Failed(String),
    TaskPanicked { task: &'static str, error: String },
}

pub struct App {
    pub store: Store,
    pub settings: SettingsStore,
    pub client: MinifluxClient,
    pub ai: AiClient,
    pub version: VersionState,
    pub version_checker: Option<VersionChecker>,
    pub keybindings: KeybindingRegistry,
    events: mpsc::Sender<AppEvent>,

    pub focus: Focus,
    pub overlay: Overlay,
    pub sidebar_selected: usize,
    pub collapsed: HashSet<i64>,
    pub detail_scroll: usize,
    /// Rendered line count of the open article, refreshed on every draw.
    pub detail_lines: usize,
    pub detail_height: usize,
    pub layout: PaneLayout,
    pub drag: Option<Drag>,

    /// Message, time shown, and whether it reports an error.
    pub status_message: Option<(Cow<'static, str>, Instant, bool)>,
    pub config_theme: String,
    pub theme: ThemeVariant,
    pub styles: StyleMap,

    pub summarizing: Option<i64>,
    pub summaries: LruCache<SummaryKey, String>,
    pub fetching_original: Option<i64>,
    pub models: Vec<ModelOption>,
    models_generation: u64,
    pub models_loading: bool,

    pub counters_interval: Option<Duration>,
    pub last_counters_refresh: Instant,
    pub version_interval: Option<Duration>,
    pub last_version_check: Option<Instant>,
    pub needs_redraw: bool,
}

impl App {
    pub fn new(
        client: MinifluxClient,
        ai: AiClient,
        settings: SettingsStore,
        config_theme: String,
        events: mpsc::Sender<AppEvent>,
    ) -> Self {
        let s = settings.get();
        let theme = ThemeVariant::resolve(
            &config_theme,
            s.theme_mode,
            std::env::var("COLORFGBG").ok().as_deref(),
        );
        let styles = StyleMap::new(theme, accent_color(&s.theme_color));
        let mut store = Store::default();
        store.content.source = EntrySource::from_home_page(&s.home_page);

        Self {
            store,
            settings,
            client,
            ai,
            version: VersionState::default(),
            version_checker: None,
            keybindings: KeybindingRegistry::new(),
            events,
            focus: Focus::Entries,
            overlay: Overlay::None,
            sidebar_selected: 0,
            collapsed: HashSet::new(),
            detail_scroll: 0,
            detail_lines: 0,
            detail_height: 0,
            layout: PaneLayout::default(),
            drag: None,
            status_message: None,
            config_theme,
            theme,
            styles,
            summarizing: None,
            summaries: LruCache::new(SUMMARY_CACHE_SIZE),
            fetching_original: None,
            models: Vec::new(),
            models_generation: 0,
            models_loading: false,
            counters_interval: None,
            last_counters_refresh: Instant::now(),
            version_interval: None,
            last_version_check: None,
            needs_redraw: true,
        }
    }

    pub fn events(&self) -> &mpsc::Sender<AppEvent> {
        &self.events
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now(), false));
    }

    pub fn set_error(&mut self, msg: impl Into<Cow<'static, str>>) {
        let msg = msg.into();
        tracing::warn!(message = %msg, "User-facing error");
        self.status_message = Some((msg, Instant::now(), true));
    }

    /// Drops the status message once it is older than [`STATUS_TTL`].
    /// Returns true if one was removed.
    pub fn clear_expired_status(&mut self) -> bool {
        match &self.status_message {
            Some((_, at, _)) if at.elapsed() >= STATUS_TTL => {
                self.status_message = None;
                true
            }
            _ => false,
        }
    }

    /// Rebuilds styles after a theme setting changed.
    pub fn apply_theme(&mut self) {
        let s = self.settings.get();
        self.theme = ThemeVariant::resolve(
            &self.config_theme,
            s.theme_mode,
            std::env::var("COLORFGBG").ok().as_deref(),
        );
        self.styles = StyleMap::new(self.theme, accent_color(&s.theme_color));
    }

    /// Sidebar rows: the four fixed sources, then categories with their feeds.
    pub fn sidebar_items(&self) -> Vec<SidebarItem> {
        let s = self.settings.get();
        let data = &self.store.data;
        let mut items = vec![
            SidebarItem::Source {
                source: EntrySource::All,
                count: data.unread_total(s.show_hidden_feeds),
            },
            SidebarItem::Source {
                source: EntrySource::Today,
                count: data.unread_today_count,
            },
            SidebarItem::Source {
                source: EntrySource::Starred,
                count: data.starred_count,
            },
            SidebarItem::Source {
                source: EntrySource::History,
                count: data.history_count,
            },
        ];
        for group in data.feed_groups(s.show_hidden_feeds, s.show_unread_feeds_only) {
            let collapsed = self.collapsed.contains(&group.category.id);
            items.push(SidebarItem::Category {
                id: group.category.id,
                title: group.category.title.clone(),
                unread: group.unread,
                collapsed,
            });
            if !collapsed {
                items.extend(group.feeds.iter().map(|(feed, unread)| SidebarItem::Feed {
                    id: feed.id,
                    title: feed.title.clone(),
                    unread: *unread,
                    has_error: feed.parsing_error_count > 0,
                }));
            }
        }
        items
    }

    pub fn selected_sidebar_item(&self) -> Option<SidebarItem> {
        self.sidebar_items().into_iter().nth(self.sidebar_selected)
    }

    pub fn clamp_sidebar_selection(&mut self) {
        let len = self.sidebar_items().len();
        self.sidebar_selected = self.sidebar_selected.min(len.saturating_sub(1));
    }

    /// Status filters offered for the current source.
    pub fn status_filter_options(&self) -> &'static [ShowStatus] {
        match self.store.content.source {
            EntrySource::History => &[],
            EntrySource::Feed(_) | EntrySource::Category(_) => {
                &[ShowStatus::Starred, ShowStatus::Unread, ShowStatus::All]
            }
            EntrySource::All | EntrySource::Today | EntrySource::Starred => {
                &[ShowStatus::Unread, ShowStatus::All]
            }
        }
    }

    /// Entry currently targeted by article actions: the open article in the
    /// detail pane, otherwise the list selection.
    pub fn target_entry(&self) -> Option<Entry> {
        let content = &self.store.content;
        match self.focus {
            Focus::Detail => content.active.clone(),
            _ => content
                .selected_entry()
                .cloned()
                .or_else(|| content.active.clone()),
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max = self.detail_lines.saturating_sub(self.detail_height);
        self.detail_scroll = (self.detail_scroll + lines).min(max);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.detail_scroll = self.detail_scroll.saturating_sub(lines);
    }

    /// Width currently in effect for a splitter, including a live drag.
    pub fn pane_width(&self, splitter: Splitter) -> u32 {
        if let Some(drag) = self.drag.filter(|d| d.splitter == splitter) {
            return drag.current_width;
        }
        let s = self.settings.get();
        match splitter {
            Splitter::Sidebar => s.sidebar_width,
            Splitter::EntryList => s.entry_list_width,
        }
    }

    /// Allowed range for a splitter given the terminal width in columns.
    ///
    /// The entry list may not squeeze the detail pane below its minimum.
    pub fn width_bounds(&self, splitter: Splitter, terminal_columns: u16) -> (u32, u32) {
        match splitter {
            Splitter::Sidebar => (SIDEBAR_WIDTH_MIN, SIDEBAR_WIDTH_MAX),
            Splitter::EntryList => {
                let sidebar_units = self.pane_width(Splitter::Sidebar);
                let container = (u32::from(terminal_columns) * UNITS_PER_COLUMN)
                    .saturating_sub(sidebar_units);
                let max = container
                    .saturating_sub(DETAIL_RESERVE_UNITS)
                    .max(ENTRY_LIST_WIDTH_MIN)
                    .min(ENTRY_LIST_WIDTH_MAX);
                (ENTRY_LIST_WIDTH_MIN, max)
            }
        }
    }

    /// Starts a drag if `column` is on a splitter of the last drawn layout.
    pub fn begin_drag(&mut self, column: u16, row: u16) -> bool {
        let within = |r: Rect| row >= r.y && row < r.y + r.height;
        let splitter = if within(self.layout.sidebar)
            && column == self.layout.sidebar.x + self.layout.sidebar.width.saturating_sub(1)
        {
            Splitter::Sidebar
        } else if within(self.layout.entries)
            && column == self.layout.entries.x + self.layout.entries.width.saturating_sub(1)
        {
            Splitter::EntryList
        } else {
            return false;
        };
        let start_width = self.pane_width(splitter);
        self.drag = Some(Drag {
            splitter,
            start_column: column,
            start_width,
            current_width: start_width,
        });
        true
    }

    /// Width of the terminal as of the last frame.
    pub fn terminal_columns(&self) -> u16 {
        self.layout.screen.width
    }

    /// Follows the pointer; the width is clamped to the splitter's bounds.
    pub fn update_drag(&mut self, column: u16, terminal_columns: u16) {
        let Some(drag) = self.drag else {
            return;
        };
        let (min, max) = self.width_bounds(drag.splitter, terminal_columns);
        let delta = (i64::from(column) - i64::from(drag.start_column)) * i64::from(UNITS_PER_COLUMN);
        let width = (i64::from(drag.start_width) + delta).clamp(i64::from(min), i64::from(max));
        self.drag = Some(Drag {
            current_width: width as u32,
            ..drag
        });
    }

    /// Ends the drag and persists the final width.
    pub fn end_drag(&mut self) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        if drag.current_width == drag.start_width {
            return;
        }
        let width = drag.current_width;
        self.persist_settings(|s| match drag.splitter {
            Splitter::Sidebar => s.sidebar_width = width,
            Splitter::EntryList => s.entry_list_width = width,
        });
    }

    /// Applies a settings change and reports a failed write on the status line.
    pub fn persist_settings(&mut self, change: impl FnOnce(&mut crate::settings::Settings)) {
        if let Err(e) = self.settings.update(change) {
            tracing::error!(error = %e, "Failed to save settings");
            self.set_error(format!("Could not save settings: {e}"));
        }
    }

    fn next_models_generation(&mut self) -> u64 {
        self.models_generation = self.models_generation.wrapping_add(1);
        self.models_generation
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::settings::storage::LocalStorage;
    use secrecy::SecretString;

    pub fn app_with_server(server: &str) -> (App, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let client = MinifluxClient::new(
            server,
            &SecretString::from("token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let ai = AiClient::new(Duration::from_secs(5)).unwrap();
        let settings = SettingsStore::load(LocalStorage::in_memory());
        (App::new(client, ai, settings, String::new(), tx), rx)
    }

    pub fn test_app() -> (App, mpsc::Receiver<AppEvent>) {
        app_with_server("http://127.0.0.1:9")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::test_app;
    use super::*;
    use crate::api::Category;
    use std::sync::Arc;
    use tokio::time;

    #[tokio::test]
    async fn test_status_expires() {
        let (mut app, _rx) = test_app();
        time::pause();
        app.set_status("Saved");
        time::advance(Duration::from_secs(3)).await;
        assert!(!app.clear_expired_status());
        time::advance(Duration::from_secs(2)).await;
        assert!(app.clear_expired_status());
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_sidebar_lists_sources_then_groups() {
        let (mut app, _rx) = test_app();
        let cat = Category {
            id: 1,
            title: "Tech".into(),
            ..Default::default()
        };
        app.store.data.categories = Arc::new(vec![cat.clone()]);
        app.store.data.feeds = Arc::new(vec![Feed {
            id: 10,
            title: "Blog".into(),
            category: cat,
            ..Default::default()
        }]);
        app.store.data.unread_info.insert(10, 3);
        app.persist_settings(|s| s.show_unread_feeds_only = false);

        let items = app.sidebar_items();
        assert_eq!(items.len(), 6);
        assert_eq!(
            items[0],
            SidebarItem::Source {
                source: EntrySource::All,
                count: 3
            }
        );
        assert_eq!(items[5].source(), EntrySource::Feed(10));

        app.collapsed.insert(1);
        assert_eq!(app.sidebar_items().len(), 5);
    }

    #[tokio::test]
    async fn test_drag_clamps_and_persists() {
        let (mut app, _rx) = test_app();
        app.layout = PaneLayout {
            sidebar: Rect::new(0, 0, 30, 40),
            entries: Rect::new(30, 0, 52, 40),
            detail: Rect::new(82, 0, 80, 40),
            ..Default::default()
        };
        assert!(app.begin_drag(29, 5));
        app.update_drag(5, 160);
        assert_eq!(app.pane_width(Splitter::Sidebar), SIDEBAR_WIDTH_MIN);
        app.update_drag(200, 160);
        assert_eq!(app.pane_width(Splitter::Sidebar), SIDEBAR_WIDTH_MAX);
        app.end_drag();
        assert!(app.drag.is_none());
        assert_eq!(app.settings.get().sidebar_width, SIDEBAR_WIDTH_MAX);

        assert!(!app.begin_drag(50, 5));
    }

    #[tokio::test]
    async fn test_entry_list_bound_leaves_room_for_detail() {
        let (app, _rx) = test_app();
        // 100 columns = 800 units, minus the 240-unit sidebar and 328 reserved
        assert_eq!(app.width_bounds(Splitter::EntryList, 100), (280, 280));
        assert_eq!(app.width_bounds(Splitter::EntryList, 200), (280, 900));
        assert_eq!(app.width_bounds(Splitter::EntryList, 120), (280, 392));
    }

    #[tokio::test]
    async fn test_status_filter_options() {
        let (mut app, _rx) = test_app();
        app.store.content.source = EntrySource::Feed(1);
        assert_eq!(app.status_filter_options().len(), 3);
        app.store.content.source = EntrySource::History;
        assert!(app.status_filter_options().is_empty());
    }
}
