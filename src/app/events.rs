//! Applies results of background tasks.

use super::{App, AppEvent, SummaryKey};
use crate::api::EntryStatus;
use std::sync::Arc;

impl App {
    /// Applies one [`AppEvent`]. Always requests a redraw.
    pub fn handle_event(&mut self, event: AppEvent) {
        self.needs_redraw = true;
        match event {
            AppEvent::DataLoaded(Ok(data)) => {
                let first_load = !self.store.data.app_ready;
                let d = &mut self.store.data;
                d.feeds = Arc::new(data.feeds);
                d.categories = Arc::new(data.categories);
                d.apply_counters(&data.counters);
                d.unread_today_count = i64::try_from(data.unread_today).unwrap_or(i64::MAX);
                d.history_count = i64::try_from(data.history).unwrap_or(i64::MAX);
                d.starred_count = i64::try_from(data.starred).unwrap_or(i64::MAX);
                d.user_id = Some(data.user_id);
                d.has_integrations = data.has_integrations;
                d.app_ready = true;
                self.last_counters_refresh = tokio::time::Instant::now();
                self.clamp_sidebar_selection();
                tracing::info!(
                    feeds = self.store.data.feeds.len(),
                    categories = self.store.data.categories.len(),
                    "Feed data loaded"
                );
                if first_load {
                    self.reload_entries();
                    self.check_version();
                    self.load_models();
                }
            }
            AppEvent::DataLoaded(Err(e)) => {
                self.set_error(format!("Failed to load feeds: {e}"));
            }
            AppEvent::CountersLoaded(counters) => {
                self.store.data.apply_counters(&counters);
            }
            AppEvent::EntriesLoaded {
                generation,
                append,
                result,
            } => self.apply_entries(generation, append, result),
            AppEvent::StatusUpdateFailed { change, error } => {
                self.store.revert_status_change(&change);
                let action = match change.new_status {
                    EntryStatus::Read => "mark as read",
                    _ => "mark as unread",
                };
                self.set_error(format!("Failed to {action}: {error}"));
            }
            AppEvent::StarToggleFailed { change, error } => {
                self.store.revert_starred_change(&change);
                let action = if change.starred { "star" } else { "unstar" };
                self.set_error(format!("Failed to {action} entry: {error}"));
            }
            AppEvent::BulkMarkDone { cutoff, result } => match result {
                Ok(counters) => {
                    self.store.finish_bulk_mark(cutoff, &counters);
                    self.set_status("Marked as read");
                }
                Err(e) => self.set_error(format!("Mark as read failed: {e}")),
            },
            AppEvent::OriginalContentLoaded { entry_id, result } => {
                self.fetching_original = None;
                match result {
                    Ok(original) => {
                        self.store.apply_original_content(entry_id, original);
                        self.forget_summaries(entry_id);
                        self.detail_scroll = 0;
                        self.set_status("Original content loaded");
                    }
                    Err(e) => self.set_error(format!("Failed to fetch original content: {e}")),
                }
            }
            AppEvent::SummaryReady { key, result } => {
                self.summarizing = None;
                match result {
                    Ok(html) => {
                        let entry_id = key.entry_id;
                        self.summaries.put(key, html.clone());
                        if self.store.replace_active_content(entry_id, html) {
                            self.detail_scroll = 0;
                            self.set_status("Summary ready");
                        }
                    }
                    Err(e) => self.set_error(e),
                }
            }
            AppEvent::ModelsLoaded {
                generation,
                provider,
                models,
            } => {
                if generation != self.models_generation
                    || provider != self.settings.get().ai_provider
                {
                    tracing::debug!(provider = %provider, "Discarding stale model list");
                    return;
                }
                self.models_loading = false;
                let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
                self.models = models;
                let mut adopted = self.settings.get().clone();
                if adopted.adopt_first_model(&ids) {
                    self.persist_settings(|s| *s = adopted);
                }
            }
            AppEvent::VersionChecked {
                generation,
                decision,
            } => {
                if !self.version.finish(generation, decision) {
                    tracing::debug!(generation, "Discarding stale version check");
                }
            }
            AppEvent::FeedsChanged { message } => {
                self.set_status(message);
                self.load_data();
                self.reload_entries();
            }
            AppEvent::Notice(msg) => self.set_status(msg),
            AppEvent::Failed(msg) => self.set_error(msg),
            AppEvent::TaskPanicked { task, error } => {
                self.set_error(format!("Internal error in {task}: {error}"));
            }
        }
    }

    fn apply_entries(
        &mut self,
        generation: u64,
        append: bool,
        result: Result<crate::api::EntriesPage, String>,
    ) {
        let dedupe = self.settings.get().remove_duplicates;
        let content = &mut self.store.content;
        match result {
            Ok(page) => {
                let applied = if append {
                    content.append_entries(generation, page, dedupe)
                } else {
                    content.replace_entries(generation, page, dedupe)
                };
                if !applied {
                    tracing::debug!(generation, "Discarding stale entry page");
                }
            }
            Err(e) => {
                if generation == content.generation {
                    content.loading_more = false;
                    if !append {
                        content.loaded = true;
                    }
                    self.set_error(format!("Failed to load entries: {e}"));
                }
            }
        }
    }

    /// Drops cached summaries of an entry whose body changed.
    fn forget_summaries(&mut self, entry_id: i64) {
        let stale: Vec<SummaryKey> = self
            .summaries
            .iter()
            .filter(|(key, _)| key.entry_id == entry_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            self.summaries.pop(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_app;
    use super::super::InitialData;
    use super::*;
    use crate::ai::{AiProvider, ModelOption};
    use crate::api::{Counters, EntriesPage, EntrySource};
    use crate::store::test_support::{category, entry, feed};
    use crate::store::StarChange;
    use crate::version::UpdateDecision;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_data_loaded_populates_counts() {
        let (mut app, _rx) = test_app();
        let cat = category(1, "News");
        let data = InitialData {
            feeds: vec![feed(10, "A", &cat), feed(11, "B", &cat)],
            categories: vec![cat],
            counters: Counters {
                unreads: [(10, 5), (99, 7)].into_iter().collect(),
                ..Default::default()
            },
            unread_today: 2,
            history: 40,
            starred: 3,
            user_id: 1,
            has_integrations: true,
        };
        app.handle_event(AppEvent::DataLoaded(Ok(Box::new(data))));

        let d = &app.store.data;
        assert!(d.app_ready);
        assert_eq!(d.feed_unread(10), 5);
        assert_eq!(d.feed_unread(11), 0);
        assert!(!d.unread_info.contains_key(&99));
        assert_eq!((d.unread_today_count, d.history_count, d.starred_count), (2, 40, 3));
        assert_eq!(d.user_id, Some(1));
    }

    #[tokio::test]
    async fn test_stale_entry_page_ignored() {
        let (mut app, _rx) = test_app();
        let old = app.store.content.begin_reload();
        let current = app.store.content.begin_reload();

        let page = |id| EntriesPage {
            total: 1,
            entries: vec![entry(id, 10)],
        };
        app.handle_event(AppEvent::EntriesLoaded {
            generation: old,
            append: false,
            result: Ok(page(1)),
        });
        assert!(app.store.content.entries.is_empty());

        app.handle_event(AppEvent::EntriesLoaded {
            generation: current,
            append: false,
            result: Ok(page(2)),
        });
        assert_eq!(app.store.content.entries[0].id, 2);
        assert!(app.store.content.loaded);
    }

    #[tokio::test]
    async fn test_star_failure_reverts_and_names_action() {
        let (mut app, _rx) = test_app();
        let e = entry(1, 10);
        app.store.content.entries = std::sync::Arc::new(vec![e.clone()]);
        let change: StarChange = app.store.apply_starred_update(&e, true);
        assert_eq!(app.store.data.starred_count, 1);

        app.handle_event(AppEvent::StarToggleFailed {
            change,
            error: "HTTP 500".into(),
        });
        assert_eq!(app.store.data.starred_count, 0);
        assert!(!app.store.content.entries[0].starred);
        let (msg, _, _) = app.status_message.clone().unwrap();
        assert_eq!(msg, "Failed to star entry: HTTP 500");
    }

    fn summary_key(entry_id: i64, model: &str) -> SummaryKey {
        SummaryKey {
            entry_id,
            provider: AiProvider::Ollama,
            model: model.into(),
        }
    }

    fn body_entry(id: i64) -> crate::api::Entry {
        let mut e = entry(id, 10);
        e.content = "<p>Body text</p>".into();
        e
    }

    #[tokio::test]
    async fn test_summary_replaces_active_article() {
        let (mut app, _rx) = test_app();
        app.persist_settings(|s| {
            s.select_ai_provider(AiProvider::Ollama);
            s.set_active_ai_key("http://127.0.0.1:9");
            s.select_ai_model("llama3");
        });
        app.store.content.activate(body_entry(4));
        app.summarizing = Some(4);
        app.handle_event(AppEvent::SummaryReady {
            key: summary_key(4, "llama3"),
            result: Ok("<section class=\"ai-summary\"></section>".into()),
        });
        assert!(app.summarizing.is_none());
        assert_eq!(
            app.store.content.active.as_ref().unwrap().content,
            "<section class=\"ai-summary\"></section>"
        );
        assert!(app.summaries.contains(&summary_key(4, "llama3")));

        // Same provider and model: served from the cache.
        app.store.content.activate(body_entry(4));
        app.summarize();
        assert!(app.summarizing.is_none());
        assert_eq!(
            app.store.content.active.as_ref().unwrap().content,
            "<section class=\"ai-summary\"></section>"
        );

        // Another model goes back to the provider.
        app.persist_settings(|s| s.select_ai_model("mistral"));
        app.store.content.activate(body_entry(4));
        app.summarize();
        assert_eq!(app.summarizing, Some(4));
        assert_eq!(app.store.content.active.as_ref().unwrap().content, "<p>Body text</p>");
    }

    #[tokio::test]
    async fn test_cached_summary_needs_a_configured_provider() {
        let (mut app, _rx) = test_app();
        app.store.content.activate(body_entry(1));
        app.summaries
            .put(summary_key(1, "llama3"), "<section>old summary</section>".into());

        app.summarize();
        let (msg, _, is_error) = app.status_message.clone().unwrap();
        assert!(is_error);
        assert!(msg.contains("provider"));
        assert_eq!(app.store.content.active.as_ref().unwrap().content, "<p>Body text</p>");
    }

    #[tokio::test]
    async fn test_original_content_drops_cached_summaries() {
        let (mut app, _rx) = test_app();
        app.store.content.activate(body_entry(1));
        app.summaries.put(summary_key(1, "llama3"), "<section>one</section>".into());
        app.summaries.put(summary_key(2, "llama3"), "<section>two</section>".into());

        app.handle_event(AppEvent::OriginalContentLoaded {
            entry_id: 1,
            result: Ok(crate::api::OriginalContent {
                content: "<p>Full article</p>".into(),
                reading_time: 1,
            }),
        });
        assert!(!app.summaries.contains(&summary_key(1, "llama3")));
        assert!(app.summaries.contains(&summary_key(2, "llama3")));
    }

    #[tokio::test]
    async fn test_models_loaded_adopts_first_model() {
        let (mut app, _rx) = test_app();
        app.persist_settings(|s| {
            s.select_ai_provider(AiProvider::Gemini);
            s.set_active_ai_key("key");
        });
        app.models_generation = 3;
        let generation = app.models_generation;

        app.handle_event(AppEvent::ModelsLoaded {
            generation: generation.wrapping_sub(1),
            provider: AiProvider::Gemini,
            models: vec![ModelOption::new("stale", "Stale")],
        });
        assert!(app.models.is_empty());

        app.handle_event(AppEvent::ModelsLoaded {
            generation,
            provider: AiProvider::Gemini,
            models: vec![
                ModelOption::new("gemini-2.0-flash", "Gemini 2.0 Flash"),
                ModelOption::new("gemini-pro", "Gemini Pro"),
            ],
        });
        assert_eq!(app.models.len(), 2);
        assert_eq!(app.settings.get().ai_model, "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn test_version_result_respects_generation() {
        let (mut app, _rx) = test_app();
        let generation = app.version.begin();
        app.handle_event(AppEvent::VersionChecked {
            generation,
            decision: Some(UpdateDecision::ByDate(true)),
        });
        assert!(app.version.has_update);
        app.dismiss_update();
        assert!(!app.version.has_update);
        assert!(app.settings.storage().get(crate::version::DISMISSED_AT_KEY).is_some());
    }

    #[tokio::test]
    async fn test_feeds_changed_reloads() {
        let (mut app, _rx) = test_app();
        app.store.content.source = EntrySource::All;
        let before = app.store.content.generation;
        app.handle_event(AppEvent::FeedsChanged {
            message: "Deleted 'x'".into(),
        });
        assert!(app.store.content.generation > before);
        assert_eq!(app.status_message.as_ref().unwrap().0, "Deleted 'x'");
    }
}
