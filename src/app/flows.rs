//! User-initiated flows.
//!
//! Each flow updates local state right away where that is safe, then hands
//! the remote call to a spawned task. Results come back as [`AppEvent`]s.

use super::tasks::spawn_task;
use super::{
    App, AppEvent, ConfirmAction, Focus, InitialData, InputKind, InputPrompt, Overlay, SettingsRow,
    Splitter, SummaryKey, RESIZE_STEP_UNITS,
};
use crate::ai::{format_summary_html, AiProvider, MAX_SUMMARY_INPUT_CHARS};
use crate::api::{
    ApiError, Entry, EntryQuery, EntrySource, EntryStatus, FeedModification, MinifluxClient,
};
use crate::settings::{
    MarkReadBy, RemoveDuplicates, ShowStatus, ARTICLE_WIDTH_MAX, ARTICLE_WIDTH_MIN,
    ARTICLE_WIDTH_STEP,
};
use crate::store::{plan_bulk_mark, BulkMarkRequest, MarkReadScope};
use crate::util::{
    extract_text, strip_control_chars, truncate_chars, validate_url_for_open,
    MAX_SEARCH_QUERY_LENGTH,
};
use crate::version::{self, UPDATE_PAGE_URL};
use chrono::{Local, NaiveDate, NaiveTime, Utc};
use std::path::PathBuf;

/// Heading of the section that replaces an article body after summarizing.
const SUMMARY_HEADING: &str = "AI Summary";

pub const THEME_COLORS: [&str; 8] = [
    "Blue", "Red", "Orange", "Yellow", "Green", "Cyan", "Purple", "Pink",
];
pub const PAGE_SIZES: [u32; 4] = [20, 50, 100, 200];
pub const ORDER_FIELDS: [&str; 2] = ["created_at", "published_at"];
const HOME_PAGES: [&str; 4] = ["all", "today", "starred", "history"];

/// Unix-second bounds of a local calendar day.
fn day_bounds(day: NaiveDate) -> Option<(i64, i64)> {
    let start = day
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()?;
    let end = day
        .succ_opt()?
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()?;
    Some((start.timestamp(), end.timestamp()))
}

/// Parses `YYYY-MM-DD` search input as a date filter.
pub fn parse_date_filter(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

fn next_in<T: PartialEq + Copy>(options: &[T], current: T) -> Option<T> {
    let idx = options.iter().position(|o| *o == current);
    match idx {
        Some(i) => options.get((i + 1) % options.len()).copied(),
        None => options.first().copied(),
    }
}

fn api_message(e: &ApiError) -> String {
    if e.is_unauthorized() {
        "Authentication failed; check the API token".to_string()
    } else {
        e.to_string()
    }
}

/// Collects every unread entry id `query` matches.
///
/// The first request uses the server's default page; when it comes back
/// short of `total`, the query is repeated with `limit = total`.
async fn collect_entry_ids(
    client: &MinifluxClient,
    source: EntrySource,
    query: EntryQuery,
) -> Result<Vec<i64>, ApiError> {
    let page = client.get_entries(source, query.clone()).await?;
    let entries = if (page.entries.len() as u64) < page.total {
        let limit = u32::try_from(page.total).unwrap_or(u32::MAX);
        client
            .get_entries(
                source,
                EntryQuery {
                    limit: Some(limit),
                    ..query
                },
            )
            .await?
            .entries
    } else {
        page.entries
    };
    Ok(entries.into_iter().map(|e| e.id).collect())
}

async fn load_initial_data(client: MinifluxClient) -> Result<InitialData, ApiError> {
    let count_query = |status| EntryQuery {
        status,
        limit: Some(1),
        ..Default::default()
    };
    let (feeds, categories, counters, today, history, starred, user) = tokio::try_join!(
        client.get_feeds(),
        client.get_categories(),
        client.get_counters(),
        client.get_entries(EntrySource::Today, count_query(Some(EntryStatus::Unread))),
        client.get_entries(EntrySource::History, count_query(None)),
        client.get_entries(EntrySource::Starred, count_query(None)),
        client.get_current_user(),
    )?;
    let has_integrations = match client.has_integrations().await {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Integration status unavailable");
            false
        }
    };
    Ok(InitialData {
        feeds,
        categories,
        counters,
        unread_today: today.total,
        history: history.total,
        starred: starred.total,
        user_id: user.id,
        has_integrations,
    })
}

impl App {
    // ---- loading ----

    /// Loads feeds, categories, counters and the aggregate totals.
    pub fn load_data(&mut self) {
        let client = self.client.clone();
        spawn_task("load_data", self.events().clone(), async move {
            let result = load_initial_data(client)
                .await
                .map(Box::new)
                .map_err(|e| api_message(&e));
            Some(AppEvent::DataLoaded(result))
        });
    }

    pub fn refresh_counters(&mut self) {
        self.last_counters_refresh = tokio::time::Instant::now();
        let client = self.client.clone();
        spawn_task("refresh_counters", self.events().clone(), async move {
            match client.get_counters().await {
                Ok(counters) => Some(AppEvent::CountersLoaded(counters)),
                Err(e) => {
                    tracing::warn!(error = %e, "Counter refresh failed");
                    None
                }
            }
        });
    }

    /// Status filter in effect for the current source.
    pub fn effective_status(&self) -> ShowStatus {
        let status = self.settings.get().show_status;
        match self.store.content.source {
            EntrySource::History => ShowStatus::All,
            EntrySource::Feed(_) | EntrySource::Category(_) => status,
            EntrySource::All | EntrySource::Today | EntrySource::Starred => match status {
                ShowStatus::Starred => ShowStatus::Unread,
                other => other,
            },
        }
    }

    /// Query for one page of the current list starting at `offset`.
    pub fn entry_query(&self, offset: u64) -> EntryQuery {
        let s = self.settings.get();
        let content = &self.store.content;
        let (status, starred) = match self.effective_status() {
            ShowStatus::Unread => (Some(EntryStatus::Unread), None),
            ShowStatus::All => (None, None),
            ShowStatus::Starred => (None, Some(true)),
        };
        let mut query = EntryQuery {
            status,
            starred,
            limit: Some(s.page_size),
            offset: Some(offset),
            order: Some(s.order_by.clone()),
            direction: Some(s.order_direction),
            search: (!content.filter_string.is_empty()).then(|| content.filter_string.clone()),
            ..Default::default()
        };
        if let Some((after, before)) = content.filter_date.and_then(day_bounds) {
            query.published_after = Some(after);
            query.published_before = Some(before);
        }
        query
    }

    /// Reloads the first page of the current list; earlier loads are superseded.
    pub fn reload_entries(&mut self) {
        let generation = self.store.content.begin_reload();
        self.spawn_entries_load(generation, 0, false);
    }

    pub fn load_more(&mut self) {
        let content = &self.store.content;
        if !content.loaded || content.loading_more {
            return;
        }
        if !content.has_more() {
            self.set_status("No more entries");
            return;
        }
        let (generation, offset) = (content.generation, content.next_offset());
        self.store.content.loading_more = true;
        self.spawn_entries_load(generation, offset, true);
    }

    fn spawn_entries_load(&mut self, generation: u64, offset: u64, append: bool) {
        let client = self.client.clone();
        let source = self.store.content.source;
        let query = self.entry_query(offset);
        spawn_task("load_entries", self.events().clone(), async move {
            let result = client
                .get_entries(source, query)
                .await
                .map_err(|e| api_message(&e));
            Some(AppEvent::EntriesLoaded {
                generation,
                append,
                result,
            })
        });
    }

    /// Switches the list to `source` and loads it.
    pub fn select_source(&mut self, source: EntrySource) {
        if source == EntrySource::Starred && self.settings.get().show_status != ShowStatus::Unread
        {
            self.persist_settings(|s| s.show_status = ShowStatus::All);
        }
        let generation = self.store.content.set_source(source);
        self.detail_scroll = 0;
        self.spawn_entries_load(generation, 0, false);
        if matches!(source, EntrySource::Category(_)) {
            self.refresh_counters();
        }
        self.focus = Focus::Entries;
        tracing::debug!(source = source.label(), "Source selected");
    }

    // ---- reading ----

    /// Opens the selected list entry in the detail pane.
    pub fn open_selected(&mut self) {
        if let Some(entry) = self.store.content.selected_entry().cloned() {
            self.open_entry(entry);
        }
    }

    fn open_entry(&mut self, entry: Entry) {
        self.store.content.activate(entry.clone());
        self.detail_scroll = 0;
        self.focus = Focus::Detail;
        if self.settings.get().mark_read_by == MarkReadBy::View && entry.is_unread() {
            self.set_entries_status(&[entry], EntryStatus::Read);
        }
    }

    /// Opens the article `step` positions away from the open one.
    pub fn open_adjacent(&mut self, step: isize) {
        let next = match self.store.content.active {
            Some(_) => self.store.content.adjacent_to_active(step).cloned(),
            None => self.store.content.selected_entry().cloned(),
        };
        match next {
            Some(entry) => {
                if let Some(pos) = self.store.content.position_of(entry.id) {
                    self.store.content.selected = pos;
                }
                self.open_entry(entry);
            }
            None if step > 0 => self.set_status("No next article"),
            None => self.set_status("No previous article"),
        }
    }

    // ---- entry actions ----

    /// Optimistically sets `status` on `entries`; the server call follows.
    pub fn set_entries_status(&mut self, entries: &[Entry], status: EntryStatus) {
        let Some(change) = self
            .store
            .apply_status_update(entries, status, Utc::now())
        else {
            return;
        };
        let client = self.client.clone();
        spawn_task("update_status", self.events().clone(), async move {
            match client
                .update_entries_status(&change.entry_ids(), change.new_status)
                .await
            {
                Ok(()) => None,
                Err(e) => Some(AppEvent::StatusUpdateFailed {
                    error: api_message(&e),
                    change,
                }),
            }
        });
    }

    pub fn toggle_status(&mut self) {
        let Some(entry) = self.target_entry() else {
            return;
        };
        let status = entry.status.toggled();
        self.set_entries_status(&[entry], status);
    }

    pub fn toggle_starred(&mut self) {
        let Some(entry) = self.target_entry() else {
            return;
        };
        let change = self.store.apply_starred_update(&entry, !entry.starred);
        let client = self.client.clone();
        spawn_task("toggle_star", self.events().clone(), async move {
            match client.toggle_bookmark(change.entry_id).await {
                Ok(()) => None,
                Err(e) => Some(AppEvent::StarToggleFailed {
                    change,
                    error: api_message(&e),
                }),
            }
        });
    }

    pub fn fetch_original(&mut self) {
        let Some(entry) = self.target_entry() else {
            return;
        };
        if self.fetching_original.is_some() {
            self.set_status("Already fetching original content");
            return;
        }
        self.fetching_original = Some(entry.id);
        self.set_status("Fetching original content...");
        let client = self.client.clone();
        spawn_task("fetch_original", self.events().clone(), async move {
            let result = client
                .fetch_original_content(entry.id)
                .await
                .map_err(|e| api_message(&e));
            Some(AppEvent::OriginalContentLoaded {
                entry_id: entry.id,
                result,
            })
        });
    }

    /// Summarizes the open article and replaces its body with the result.
    pub fn summarize(&mut self) {
        let Some(entry) = self.store.content.active.clone() else {
            return;
        };
        if self.summarizing.is_some() {
            self.set_status("Summary already in progress");
            return;
        }
        let s = self.settings.get();
        let provider = s.ai_provider;
        let key = s.active_ai_key().to_string();
        let model = s.ai_model.trim().to_string();
        if provider == AiProvider::None {
            self.set_error("Select an AI provider in settings first");
            return;
        }
        if key.is_empty() {
            self.set_error(if provider.uses_base_url() {
                "Set the server URL for this provider in settings"
            } else {
                "Set an API key for this provider in settings"
            });
            return;
        }
        if model.is_empty() {
            self.set_error("Select an AI model in settings first");
            return;
        }
        let cache_key = SummaryKey {
            entry_id: entry.id,
            provider,
            model: model.clone(),
        };
        if let Some(html) = self.summaries.get(&cache_key).cloned() {
            if self.store.replace_active_content(entry.id, html) {
                self.detail_scroll = 0;
            }
            self.set_status("Summary ready");
            return;
        }
        let text = extract_text(&entry.content);
        let text = text.trim();
        if text.is_empty() {
            self.set_error("Article has no text to summarize");
            return;
        }
        let text = truncate_chars(text, MAX_SUMMARY_INPUT_CHARS).to_string();

        self.summarizing = Some(entry.id);
        self.set_status(format!("Summarizing with {}...", provider.label()));
        let ai = self.ai.clone();
        spawn_task("summarize", self.events().clone(), async move {
            let result = match ai.summarize(provider, &key, &model, &entry.title, &text).await {
                Ok(summary) => {
                    let html = format_summary_html(&summary, SUMMARY_HEADING);
                    if html.is_empty() {
                        Err("Provider returned no summary text".to_string())
                    } else {
                        Ok(html)
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Summarization failed");
                    Err(format!("Summarization failed: {e}"))
                }
            };
            Some(AppEvent::SummaryReady {
                key: cache_key,
                result,
            })
        });
    }

    /// Sends the target entry to the user's third-party integrations.
    pub fn save_entry(&mut self) {
        let Some(entry) = self.target_entry() else {
            return;
        };
        if !self.store.data.has_integrations {
            self.set_status("No third-party integrations configured on the server");
            return;
        }
        let client = self.client.clone();
        spawn_task("save_entry", self.events().clone(), async move {
            Some(match client.save_entry(entry.id).await {
                Ok(()) => AppEvent::Notice("Saved to third-party services".into()),
                Err(e) => AppEvent::Failed(format!("Save failed: {}", api_message(&e))),
            })
        });
    }

    pub fn open_in_browser(&mut self) {
        let Some(entry) = self.target_entry() else {
            return;
        };
        self.open_url(&entry.url);
    }

    pub fn view_update(&mut self) {
        self.open_url(UPDATE_PAGE_URL);
    }

    fn open_url(&mut self, url: &str) {
        if url.trim().is_empty() {
            self.set_status("Entry has no link");
            return;
        }
        match validate_url_for_open(url) {
            Err(e) => self.set_error(e.to_string()),
            Ok(url) => {
                if let Err(e) = open::that(url.as_str()) {
                    self.set_error(format!("Failed to open browser: {e}"));
                }
            }
        }
    }

    // ---- bulk and server-side feed operations ----

    pub fn open_mark_read_menu(&mut self) {
        if MarkReadScope::options_for(self.store.content.source).is_empty() {
            self.set_status("Nothing to mark as read here");
            return;
        }
        self.overlay = Overlay::MarkReadMenu { selected: 0 };
    }

    /// Marks the current source read server-side, then syncs local state.
    pub fn mark_read(&mut self, scope: MarkReadScope) {
        let now = Utc::now();
        let content = &self.store.content;
        let source = content.source;
        let Some(request) = plan_bulk_mark(
            source,
            scope,
            content.filter_date.is_some() && source != EntrySource::Today,
            self.settings.get().show_status,
            now,
        ) else {
            return;
        };
        let request = match request {
            BulkMarkRequest::Query { source, mut query } => {
                if let Some((after, before)) = content.filter_date.and_then(day_bounds) {
                    query.published_after = Some(after);
                    query.published_before =
                        Some(query.published_before.map_or(before, |b| b.min(before)));
                }
                if !content.filter_string.is_empty() {
                    query.search = Some(content.filter_string.clone());
                }
                BulkMarkRequest::Query { source, query }
            }
            other => other,
        };
        let user_id = self.store.data.user_id;
        let cutoff = scope.cutoff(now);
        let client = self.client.clone();
        self.set_status("Marking as read...");
        spawn_task("mark_read", self.events().clone(), async move {
            let work = async {
                match request {
                    BulkMarkRequest::Everything => match user_id {
                        Some(id) => client.mark_all_as_read(id).await?,
                        None => {
                            return Err(BulkError::Precondition("User not loaded yet".to_string()))
                        }
                    },
                    BulkMarkRequest::Feed(id) => client.mark_feed_as_read(id).await?,
                    BulkMarkRequest::Category(id) => client.mark_category_as_read(id).await?,
                    BulkMarkRequest::Query { source, query } => {
                        let ids = collect_entry_ids(&client, source, query).await?;
                        tracing::info!(count = ids.len(), "Marking entries read by id");
                        client.update_entries_status(&ids, EntryStatus::Read).await?;
                    }
                }
                Ok::<_, BulkError>(client.get_counters().await?)
            };
            let result = work.await.map_err(|e| e.to_string());
            Some(AppEvent::BulkMarkDone { cutoff, result })
        });
    }

    /// Asks the server to refresh the feeds behind the current source.
    pub fn refresh_feeds(&mut self) {
        let source = self.store.content.source;
        let client = self.client.clone();
        self.set_status("Refreshing feeds...");
        spawn_task("refresh_feeds", self.events().clone(), async move {
            let result = match source {
                EntrySource::Feed(id) => client.refresh_feed(id).await,
                EntrySource::Category(id) => client.refresh_category(id).await,
                _ => client.refresh_all_feeds().await,
            };
            Some(match result {
                Ok(()) => AppEvent::FeedsChanged {
                    message: "Feeds refreshed".to_string(),
                },
                Err(e) => AppEvent::Failed(format!("Refresh failed: {}", api_message(&e))),
            })
        });
    }

    fn spawn_feed_change<F>(&mut self, task: &'static str, message: String, work: F)
    where
        F: std::future::Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        spawn_task(task, self.events().clone(), async move {
            Some(match work.await {
                Ok(()) => AppEvent::FeedsChanged { message },
                Err(e) => AppEvent::Failed(format!("{task} failed: {}", api_message(&e))),
            })
        });
    }

    pub fn delete_feed(&mut self, feed_id: i64, title: String) {
        if self.store.content.source == EntrySource::Feed(feed_id) {
            self.select_source(EntrySource::All);
        }
        let client = self.client.clone();
        self.spawn_feed_change("delete_feed", format!("Deleted '{title}'"), async move {
            client.delete_feed(feed_id).await
        });
    }

    pub fn delete_category(&mut self, category_id: i64, title: String) {
        let showing = match self.store.content.source {
            EntrySource::Category(id) => id == category_id,
            EntrySource::Feed(id) => self.store.data.feed_ids_in_category(category_id).contains(&id),
            _ => false,
        };
        if showing {
            self.select_source(EntrySource::All);
        }
        let client = self.client.clone();
        self.spawn_feed_change("delete_category", format!("Deleted '{title}'"), async move {
            client.delete_category(category_id).await
        });
    }

    pub fn rename_feed(&mut self, feed_id: i64, title: String) {
        let client = self.client.clone();
        let change = FeedModification {
            title: Some(title.clone()),
            ..Default::default()
        };
        self.spawn_feed_change("rename_feed", format!("Renamed to '{title}'"), async move {
            client.update_feed(feed_id, &change).await.map(|_| ())
        });
    }

    pub fn rename_category(&mut self, category_id: i64, title: String) {
        let client = self.client.clone();
        let message = format!("Renamed to '{title}'");
        self.spawn_feed_change("rename_category", message, async move {
            client.update_category(category_id, &title).await.map(|_| ())
        });
    }

    pub fn create_category(&mut self, title: String) {
        let client = self.client.clone();
        let message = format!("Created '{title}'");
        self.spawn_feed_change("create_category", message, async move {
            client.create_category(&title).await.map(|_| ())
        });
    }

    /// Downloads the server's OPML export and writes it to `path`.
    pub fn export_opml(&mut self, path: PathBuf) {
        let client = self.client.clone();
        spawn_task("export_opml", self.events().clone(), async move {
            let result = match client.export_opml().await {
                Ok(content) => crate::opml::write_export(&path, &content)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(api_message(&e)),
            };
            Some(match result {
                Ok(()) => AppEvent::Notice(format!("Exported to {}", path.display()).into()),
                Err(e) => AppEvent::Failed(format!("Export failed: {e}")),
            })
        });
    }

    // ---- prompts ----

    pub fn open_input(&mut self, kind: InputKind, initial: impl Into<String>) {
        self.overlay = Overlay::Input(InputPrompt {
            kind,
            buffer: initial.into(),
        });
    }

    /// Applies a submitted prompt.
    pub fn submit_input(&mut self, prompt: InputPrompt) {
        let value = strip_control_chars(prompt.buffer.trim()).into_owned();
        match prompt.kind {
            InputKind::Search => self.apply_search(&value),
            InputKind::AiKey => {
                self.persist_settings(|s| s.set_active_ai_key(&value));
                self.load_models();
            }
            _ if value.is_empty() => self.set_status("Title cannot be empty"),
            InputKind::RenameFeed(id) => self.rename_feed(id, value),
            InputKind::RenameCategory(id) => self.rename_category(id, value),
            InputKind::NewCategory => self.create_category(value),
            InputKind::ExportPath => self.export_opml(PathBuf::from(value)),
        }
    }

    /// A `YYYY-MM-DD` query filters by publication day; anything else is a
    /// full-text search. Empty input clears both.
    pub fn apply_search(&mut self, input: &str) {
        let content = &mut self.store.content;
        match parse_date_filter(input) {
            Some(day) => {
                content.filter_date = Some(day);
                content.filter_string.clear();
            }
            None => {
                content.filter_date = None;
                content.filter_string = truncate_chars(input, MAX_SEARCH_QUERY_LENGTH).to_string();
            }
        }
        self.reload_entries();
    }

    // ---- confirmations ----

    pub fn confirm(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::MarkRead(scope) => self.mark_read(scope),
            ConfirmAction::DeleteFeed { feed_id, title } => self.delete_feed(feed_id, title),
            ConfirmAction::DeleteCategory { category_id, title } => {
                self.delete_category(category_id, title)
            }
        }
    }

    // ---- list settings ----

    pub fn cycle_status_filter(&mut self) {
        let options = self.status_filter_options();
        let Some(next) = next_in(options, self.effective_status()) else {
            self.set_status("History always shows read entries");
            return;
        };
        self.persist_settings(|s| s.show_status = next);
        self.set_status(format!("Showing {}", next.as_str()));
        self.reload_entries();
    }

    pub fn toggle_order(&mut self) {
        self.persist_settings(|s| s.order_direction = s.order_direction.toggled());
        self.reload_entries();
    }

    pub fn cycle_theme(&mut self) {
        let mode = self.settings.get().theme_mode.next();
        self.persist_settings(|s| s.theme_mode = mode);
        self.apply_theme();
        self.set_status(format!("Theme: {}", self.theme.name()));
    }

    /// Keyboard resize of a splitter by `steps` (negative shrinks).
    pub fn resize_pane(&mut self, splitter: Splitter, steps: i32, terminal_columns: u16) {
        let (min, max) = self.width_bounds(splitter, terminal_columns);
        let current = i64::from(self.pane_width(splitter));
        let width = (current + i64::from(steps) * i64::from(RESIZE_STEP_UNITS))
            .clamp(i64::from(min), i64::from(max)) as u32;
        self.persist_settings(|s| match splitter {
            Splitter::Sidebar => s.sidebar_width = width,
            Splitter::EntryList => s.entry_list_width = width,
        });
    }

    pub fn adjust_article_width(&mut self, steps: i32) {
        let current = self.settings.get().article_width as i64;
        let width = (current + i64::from(steps) * i64::from(ARTICLE_WIDTH_STEP))
            .clamp(i64::from(ARTICLE_WIDTH_MIN), i64::from(ARTICLE_WIDTH_MAX))
            as u32;
        self.persist_settings(|s| s.article_width = width);
        self.set_status(format!("Article width {width}%"));
    }

    // ---- settings overlay ----

    /// Current value of a settings row, for display.
    pub fn setting_value(&self, row: SettingsRow) -> String {
        let s = self.settings.get();
        let on_off = |b: bool| if b { "on" } else { "off" }.to_string();
        match row {
            SettingsRow::AiProvider => s.ai_provider.label().to_string(),
            SettingsRow::AiKey if s.active_ai_key().is_empty() => "(not set)".to_string(),
            SettingsRow::AiKey if s.ai_provider.uses_base_url() => s.active_ai_key().to_string(),
            SettingsRow::AiKey => "********".to_string(),
            SettingsRow::AiModel if self.models_loading => "loading...".to_string(),
            SettingsRow::AiModel if s.ai_model.is_empty() => "(none)".to_string(),
            SettingsRow::AiModel => self
                .models
                .iter()
                .find(|m| m.id == s.ai_model)
                .map_or_else(|| s.ai_model.clone(), |m| m.label.clone()),
            SettingsRow::ThemeMode => format!("{:?}", s.theme_mode).to_lowercase(),
            SettingsRow::ThemeColor => s.theme_color.clone(),
            SettingsRow::HomePage => s.home_page.clone(),
            SettingsRow::OrderBy => format!("{} ({:?})", s.order_by, s.order_direction).to_lowercase(),
            SettingsRow::PageSize => s.page_size.to_string(),
            SettingsRow::RemoveDuplicates => format!("{:?}", s.remove_duplicates).to_lowercase(),
            SettingsRow::MarkReadBy => format!("on {:?}", s.mark_read_by).to_lowercase(),
            SettingsRow::ShowReadingTime => on_off(s.show_estimated_reading_time),
            SettingsRow::ShowHiddenFeeds => on_off(s.show_hidden_feeds),
            SettingsRow::UnreadFeedsOnly => on_off(s.show_unread_feeds_only),
            SettingsRow::DetailedRelativeTime => on_off(s.show_detailed_relative_time),
        }
    }

    /// Advances a settings row to its next value.
    pub fn activate_setting(&mut self, row: SettingsRow) {
        let s = self.settings.get().clone();
        match row {
            SettingsRow::AiProvider => {
                self.persist_settings(|s| s.select_ai_provider(s.ai_provider.next()));
                self.models.clear();
                self.load_models();
            }
            SettingsRow::AiKey => {
                if s.ai_provider == AiProvider::None {
                    self.set_status("Select an AI provider first");
                } else {
                    self.open_input(InputKind::AiKey, s.active_ai_key());
                }
            }
            SettingsRow::AiModel => {
                let ids: Vec<&str> = self.models.iter().map(|m| m.id.as_str()).collect();
                match next_in(&ids, s.ai_model.as_str()) {
                    Some(next) => {
                        let next = next.to_string();
                        self.persist_settings(|s| s.select_ai_model(&next));
                    }
                    None => self.set_status("No models available for this provider"),
                }
            }
            SettingsRow::ThemeMode => self.cycle_theme(),
            SettingsRow::ThemeColor => {
                let next = next_in(&THEME_COLORS, s.theme_color.as_str()).unwrap_or("Blue");
                self.persist_settings(|s| s.theme_color = next.to_string());
                self.apply_theme();
            }
            SettingsRow::HomePage => {
                let next = next_in(&HOME_PAGES, s.home_page.as_str()).unwrap_or("all");
                self.persist_settings(|s| s.home_page = next.to_string());
            }
            SettingsRow::OrderBy => {
                let next = next_in(&ORDER_FIELDS, s.order_by.as_str()).unwrap_or("created_at");
                self.persist_settings(|s| s.order_by = next.to_string());
                self.reload_entries();
            }
            SettingsRow::PageSize => {
                let next = next_in(&PAGE_SIZES, s.page_size).unwrap_or(100);
                self.persist_settings(|s| s.page_size = next);
                self.reload_entries();
            }
            SettingsRow::RemoveDuplicates => {
                const ORDER: [RemoveDuplicates; 4] = [
                    RemoveDuplicates::None,
                    RemoveDuplicates::Title,
                    RemoveDuplicates::Url,
                    RemoveDuplicates::Hash,
                ];
                let next = next_in(&ORDER, s.remove_duplicates).unwrap_or_default();
                self.persist_settings(|s| s.remove_duplicates = next);
                self.reload_entries();
            }
            SettingsRow::MarkReadBy => self.persist_settings(|s| {
                s.mark_read_by = match s.mark_read_by {
                    MarkReadBy::View => MarkReadBy::Manual,
                    MarkReadBy::Manual => MarkReadBy::View,
                }
            }),
            SettingsRow::ShowReadingTime => {
                self.persist_settings(|s| s.show_estimated_reading_time ^= true)
            }
            SettingsRow::ShowHiddenFeeds => {
                self.persist_settings(|s| s.show_hidden_feeds ^= true);
                self.clamp_sidebar_selection();
            }
            SettingsRow::UnreadFeedsOnly => {
                self.persist_settings(|s| s.show_unread_feeds_only ^= true);
                self.clamp_sidebar_selection();
            }
            SettingsRow::DetailedRelativeTime => {
                self.persist_settings(|s| s.show_detailed_relative_time ^= true)
            }
        }
    }

    /// Restores default settings.
    pub fn reset_settings(&mut self) {
        if let Err(e) = self.settings.reset() {
            self.set_error(format!("Could not reset settings: {e}"));
            return;
        }
        self.apply_theme();
        self.models.clear();
        self.set_status("Settings reset");
        self.reload_entries();
    }

    /// Fetches the model list for the selected provider.
    pub fn load_models(&mut self) {
        let s = self.settings.get();
        let provider = s.ai_provider;
        let key = s.active_ai_key().to_string();
        let generation = self.next_models_generation();
        if provider == AiProvider::None || key.is_empty() {
            self.models.clear();
            self.models_loading = false;
            return;
        }
        self.models_loading = true;
        let ai = self.ai.clone();
        spawn_task("load_models", self.events().clone(), async move {
            let models = match ai.fetch_provider_models(provider, &key).await {
                Ok(models) => models,
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Model listing failed");
                    Vec::new()
                }
            };
            Some(AppEvent::ModelsLoaded {
                generation,
                provider,
                models,
            })
        });
    }

    // ---- background ----

    /// Starts a version check unless it is skipped (dev build, recent dismissal).
    pub fn check_version(&mut self) {
        self.last_version_check = Some(tokio::time::Instant::now());
        let Some(checker) = self.version_checker.clone() else {
            return;
        };
        let now = Utc::now();
        if let Some(reason) = checker.skip_reason(self.settings.storage(), now) {
            tracing::debug!(?reason, "Version check skipped");
            return;
        }
        let generation = self.version.begin();
        spawn_task("version_check", self.events().clone(), async move {
            let decision = match checker.check(now).await {
                Ok(decision) => Some(decision),
                Err(e) => {
                    tracing::debug!(error = %e, "Version check failed");
                    None
                }
            };
            Some(AppEvent::VersionChecked {
                generation,
                decision,
            })
        });
    }

    /// Hides the update banner for the next 24 hours.
    pub fn dismiss_update(&mut self) {
        if !self.version.has_update {
            return;
        }
        self.version.dismiss();
        if let Err(e) = version::dismiss(self.settings.storage_mut(), Utc::now()) {
            tracing::warn!(error = %e, "Failed to persist update dismissal");
        }
    }

    /// Periodic work driven by the loop's tick.
    pub fn on_tick(&mut self) {
        if self.clear_expired_status() {
            self.needs_redraw = true;
        }
        if !self.store.data.app_ready {
            return;
        }
        if let Some(interval) = self.counters_interval {
            if self.last_counters_refresh.elapsed() >= interval {
                self.refresh_counters();
            }
        }
        if let Some(interval) = self.version_interval {
            let due = self
                .last_version_check
                .is_none_or(|at| at.elapsed() >= interval);
            if due {
                self.check_version();
            }
        }
    }
}

/// Error of the bulk mark task: an API failure or a local precondition.
#[derive(Debug)]
enum BulkError {
    Api(ApiError),
    Precondition(String),
}

impl From<ApiError> for BulkError {
    fn from(e: ApiError) -> Self {
        BulkError::Api(e)
    }
}

impl std::fmt::Display for BulkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BulkError::Api(e) => f.write_str(&api_message(e)),
            BulkError::Precondition(msg) => f.write_str(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{app_with_server, test_app};
    use super::*;
    use crate::settings::ThemeMode;
    use crate::store::test_support::entry;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_date_filter() {
        assert_eq!(
            parse_date_filter("2024-03-09"),
            NaiveDate::from_ymd_opt(2024, 3, 9)
        );
        assert_eq!(parse_date_filter("rust 2024"), None);
        assert_eq!(parse_date_filter("2024-3-9"), None);
    }

    #[tokio::test]
    async fn test_entry_query_follows_settings() {
        let (mut app, _rx) = test_app();
        app.persist_settings(|s| {
            s.page_size = 50;
            s.show_status = ShowStatus::Starred;
        });
        app.store.content.source = EntrySource::Feed(3);
        app.store.content.filter_string = "tokio".into();

        let q = app.entry_query(50);
        assert_eq!(q.limit, Some(50));
        assert_eq!(q.offset, Some(50));
        assert_eq!(q.starred, Some(true));
        assert_eq!(q.status, None);
        assert_eq!(q.search.as_deref(), Some("tokio"));

        app.store.content.source = EntrySource::All;
        assert_eq!(app.entry_query(0).status, Some(EntryStatus::Unread));
        assert_eq!(app.entry_query(0).starred, None);
    }

    #[tokio::test]
    async fn test_date_filter_spans_one_day() {
        let (mut app, _rx) = test_app();
        app.store.content.filter_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let q = app.entry_query(0);
        let (after, before) = (q.published_after.unwrap(), q.published_before.unwrap());
        assert!(before - after >= 23 * 3600 && before - after <= 25 * 3600);
    }

    #[tokio::test]
    async fn test_starred_source_resets_status_filter() {
        let (mut app, _rx) = test_app();
        app.persist_settings(|s| s.show_status = ShowStatus::Starred);
        app.select_source(EntrySource::Starred);
        assert_eq!(app.settings.get().show_status, ShowStatus::All);
        assert_eq!(app.focus, Focus::Entries);
    }

    #[tokio::test]
    async fn test_summarize_preconditions() {
        let (mut app, _rx) = test_app();
        app.summarize();
        assert!(app.status_message.is_none());

        let mut e = entry(1, 10);
        e.content = "<p>Body</p>".into();
        app.store.content.activate(e.clone());
        app.summarize();
        let (msg, _, is_error) = app.status_message.clone().unwrap();
        assert!(is_error);
        assert!(msg.contains("provider"));

        app.persist_settings(|s| s.select_ai_provider(AiProvider::Anthropic));
        app.summarize();
        assert!(app.status_message.as_ref().unwrap().0.contains("API key"));

        app.persist_settings(|s| s.set_active_ai_key("sk-test"));
        app.summarize();
        assert!(app.status_message.as_ref().unwrap().0.contains("model"));

        app.persist_settings(|s| s.select_ai_model("claude"));
        e.content = "<img src=\"x.png\">".into();
        app.store.content.activate(e);
        app.summarize();
        assert!(app.status_message.as_ref().unwrap().0.contains("no text"));
        assert!(app.summarizing.is_none());
    }

    #[tokio::test]
    async fn test_failed_status_update_rolls_back() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/entries"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (mut app, mut rx) = app_with_server(&server.uri());
        let e = entry(1, 10);
        app.store.content.entries = Arc::new(vec![e.clone()]);
        app.store.content.loaded = true;
        app.store.data.unread_info.insert(10, 4);

        app.toggle_status();
        assert_eq!(app.store.data.feed_unread(10), 3);
        assert_eq!(app.store.data.history_count, 1);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, AppEvent::StatusUpdateFailed { .. }));
        app.handle_event(event);

        assert_eq!(app.store.data.feed_unread(10), 4);
        assert_eq!(app.store.data.history_count, 0);
        assert_eq!(app.store.content.entries[0].status, EntryStatus::Unread);
        let (msg, _, is_error) = app.status_message.clone().unwrap();
        assert!(is_error);
        assert!(msg.starts_with("Failed to mark as read"));
    }

    #[tokio::test]
    async fn test_mark_read_refetches_short_page() {
        let server = MockServer::start().await;
        let mut old = entry(1, 10);
        old.published_at = Utc::now() - chrono::Duration::days(3);
        let body = |entries: Vec<Entry>| {
            serde_json::json!({ "total": 2, "entries": entries })
        };
        Mock::given(method("GET"))
            .and(path("/v1/entries"))
            .and(wiremock::matchers::query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(vec![old.clone(), {
                let mut e = entry(2, 10);
                e.published_at = old.published_at;
                e
            }])))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/entries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(vec![old.clone()])))
            .with_priority(2)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/entries"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/feeds/counters"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"reads": {}, "unreads": {"10": 0}})),
            )
            .mount(&server)
            .await;

        let (mut app, mut rx) = app_with_server(&server.uri());
        let mut fresh = entry(3, 10);
        fresh.published_at = Utc::now();
        app.store.content.entries = Arc::new(vec![old, fresh]);
        app.store.data.unread_info.insert(10, 3);

        app.mark_read(MarkReadScope::OlderThanDay);
        let event = rx.recv().await.unwrap();
        app.handle_event(event);

        let statuses: Vec<EntryStatus> =
            app.store.content.entries.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![EntryStatus::Read, EntryStatus::Unread]);
        assert_eq!(app.store.data.feed_unread(10), 0);
    }

    #[tokio::test]
    async fn test_cycle_status_filter_per_source() {
        let (mut app, _rx) = test_app();
        app.store.content.source = EntrySource::All;
        app.cycle_status_filter();
        assert_eq!(app.settings.get().show_status, ShowStatus::All);
        app.cycle_status_filter();
        assert_eq!(app.settings.get().show_status, ShowStatus::Unread);

        app.store.content.source = EntrySource::Category(1);
        app.cycle_status_filter();
        assert_eq!(app.settings.get().show_status, ShowStatus::All);
        app.cycle_status_filter();
        assert_eq!(app.settings.get().show_status, ShowStatus::Starred);
    }

    #[tokio::test]
    async fn test_article_width_steps_within_bounds() {
        let (mut app, _rx) = test_app();
        app.adjust_article_width(10);
        assert_eq!(app.settings.get().article_width, ARTICLE_WIDTH_MAX);
        app.adjust_article_width(-2);
        assert_eq!(app.settings.get().article_width, 80);
    }

    #[tokio::test]
    async fn test_settings_rows_cycle() {
        let (mut app, _rx) = test_app();
        app.activate_setting(SettingsRow::PageSize);
        assert_eq!(app.settings.get().page_size, 200);
        app.activate_setting(SettingsRow::ThemeColor);
        assert_eq!(app.settings.get().theme_color, "Red");
        app.activate_setting(SettingsRow::MarkReadBy);
        assert_eq!(app.settings.get().mark_read_by, MarkReadBy::Manual);
        app.activate_setting(SettingsRow::AiProvider);
        assert_eq!(app.settings.get().ai_provider, AiProvider::Anthropic);
        assert_eq!(app.setting_value(SettingsRow::AiKey), "(not set)");
        app.activate_setting(SettingsRow::ThemeMode);
        assert_eq!(app.settings.get().theme_mode, ThemeMode::Light);
    }
}
