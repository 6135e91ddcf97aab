use crate::api::{Category, Counters, Feed};
use std::collections::HashMap;
use std::sync::Arc;

/// Feeds, categories and the unread bookkeeping derived from them.
#[derive(Debug, Clone, Default)]
pub struct DataState {
    pub feeds: Arc<Vec<Feed>>,
    pub categories: Arc<Vec<Category>>,
    /// Feed id → unread entries. Feeds missing from the map count as zero.
    pub unread_info: HashMap<i64, i64>,
    pub unread_today_count: i64,
    pub history_count: i64,
    pub starred_count: i64,
    /// Whether "save to third-party services" is available.
    pub has_integrations: bool,
    pub user_id: Option<i64>,
    /// Set after the first complete load of feeds, categories and counters.
    pub app_ready: bool,
}

/// A category with its visible feeds, as listed in the sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedGroup<'a> {
    pub category: &'a Category,
    pub unread: i64,
    pub feeds: Vec<(&'a Feed, i64)>,
}

impl DataState {
    pub fn feed_unread(&self, feed_id: i64) -> i64 {
        self.unread_info.get(&feed_id).copied().unwrap_or(0)
    }

    pub fn feed(&self, feed_id: i64) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.id == feed_id)
    }

    pub fn category(&self, category_id: i64) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    pub fn feed_ids_in_category(&self, category_id: i64) -> Vec<i64> {
        self.feeds
            .iter()
            .filter(|f| f.category.id == category_id)
            .map(|f| f.id)
            .collect()
    }

    fn is_visible(feed: &Feed, show_hidden: bool) -> bool {
        show_hidden || !(feed.hide_globally || feed.category.hide_globally)
    }

    /// Unread entries across all feeds shown in the "All" view.
    pub fn unread_total(&self, show_hidden: bool) -> i64 {
        self.feeds
            .iter()
            .filter(|f| Self::is_visible(f, show_hidden))
            .map(|f| self.feed_unread(f.id))
            .sum()
    }

    pub fn category_unread(&self, category_id: i64) -> i64 {
        self.feeds
            .iter()
            .filter(|f| f.category.id == category_id)
            .map(|f| self.feed_unread(f.id))
            .sum()
    }

    /// Categories in title order with their feeds.
    ///
    /// `unread_only` drops feeds without unread entries and then categories
    /// left empty.
    pub fn feed_groups(&self, show_hidden: bool, unread_only: bool) -> Vec<FeedGroup<'_>> {
        let mut categories: Vec<&Category> = self.categories.iter().collect();
        categories.sort_by_key(|c| c.title.to_lowercase());

        categories
            .into_iter()
            .filter_map(|category| {
                let mut feeds: Vec<(&Feed, i64)> = self
                    .feeds
                    .iter()
                    .filter(|f| f.category.id == category.id && Self::is_visible(f, show_hidden))
                    .map(|f| (f, self.feed_unread(f.id)))
                    .filter(|(_, unread)| !unread_only || *unread > 0)
                    .collect();
                if unread_only && feeds.is_empty() {
                    return None;
                }
                feeds.sort_by_key(|(f, _)| f.title.to_lowercase());
                let unread = feeds.iter().map(|(_, u)| u).sum();
                Some(FeedGroup {
                    category,
                    unread,
                    feeds,
                })
            })
            .collect()
    }

    /// Replaces `unread_info` from server counters, one slot per known feed.
    pub fn apply_counters(&mut self, counters: &Counters) {
        self.unread_info = self
            .feeds
            .iter()
            .map(|f| (f.id, counters.unreads.get(&f.id).copied().unwrap_or(0).max(0)))
            .collect();
    }

    /// Adds `delta` to a feed's unread count, clamped at zero. Returns the change applied.
    pub fn adjust_feed_unread(&mut self, feed_id: i64, delta: i64) -> i64 {
        let slot = self.unread_info.entry(feed_id).or_insert(0);
        let before = *slot;
        *slot = (before + delta).max(0);
        *slot - before
    }
}

/// Adds `delta` to `counter`, clamped at zero. Returns the change applied.
pub(crate) fn adjust_clamped(counter: &mut i64, delta: i64) -> i64 {
    let before = *counter;
    *counter = (before + delta).max(0);
    *counter - before
}
