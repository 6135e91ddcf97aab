//! In-memory state shown by the UI.
//!
//! [`ContentState`] covers the entry list and the open article;
//! [`DataState`] covers feeds, categories and unread counters. The
//! optimistic mutations in [`actions`] touch both, which is why they live
//! on [`Store`] rather than on either half.

pub mod actions;
mod content;
mod data;

pub use actions::{
    plan_bulk_mark, BulkMarkRequest, MarkReadScope, PreviousStatus, StarChange, StatusChange,
};
pub use content::ContentState;
pub use data::{DataState, FeedGroup};

#[derive(Debug, Clone, Default)]
pub struct Store {
    pub content: ContentState,
    pub data: DataState,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Store;
    use crate::api::{Category, Entry, EntryStatus, Feed};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    pub fn category(id: i64, title: &str) -> Category {
        Category {
            id,
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn feed(id: i64, title: &str, category: &Category) -> Feed {
        Feed {
            id,
            title: title.to_string(),
            category: category.clone(),
            ..Default::default()
        }
    }

    pub fn entry(id: i64, feed_id: i64) -> Entry {
        Entry {
            id,
            feed_id,
            title: format!("Entry {id}"),
            url: format!("https://example.com/{id}"),
            comments_url: String::new(),
            author: String::new(),
            content: "<p>body</p>".to_string(),
            hash: format!("hash-{id}"),
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            created_at: None,
            changed_at: None,
            status: EntryStatus::Unread,
            starred: false,
            reading_time: 1,
            feed: None,
        }
    }

    /// A store listing `entries`, with feeds 10 and 11 in category 1.
    pub fn store_with(entries: Vec<Entry>) -> Store {
        let cat = category(1, "General");
        let mut store = Store::default();
        store.data.feeds = Arc::new(vec![feed(10, "Ten", &cat), feed(11, "Eleven", &cat)]);
        store.data.categories = Arc::new(vec![cat]);
        store.content.entries = Arc::new(entries);
        store.content.loaded = true;
        store
    }
}
