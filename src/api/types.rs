use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Read state of an entry as the server reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Read,
    Unread,
    Removed,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Read => "read",
            EntryStatus::Unread => "unread",
            EntryStatus::Removed => "removed",
        }
    }

    /// The status a toggle moves to. Removed entries toggle back to unread.
    pub fn toggled(self) -> Self {
        match self {
            EntryStatus::Unread => EntryStatus::Read,
            EntryStatus::Read | EntryStatus::Removed => EntryStatus::Unread,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub user_id: i64,
    pub hide_globally: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedIcon {
    pub feed_id: i64,
    pub icon_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feed {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub feed_url: String,
    pub site_url: String,
    pub category: Category,
    pub icon: Option<FeedIcon>,
    pub crawler: bool,
    pub disabled: bool,
    pub hide_globally: bool,
    pub parsing_error_count: i64,
    pub parsing_error_message: String,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub feed_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub comments_url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default)]
    pub hash: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
    pub status: EntryStatus,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub reading_time: u32,
    #[serde(default)]
    pub feed: Option<Feed>,
}

impl Entry {
    /// Feed title from the embedded feed, or an empty string.
    pub fn feed_title(&self) -> &str {
        self.feed.as_ref().map_or("", |f| f.title.as_str())
    }

    pub fn category_id(&self) -> Option<i64> {
        self.feed.as_ref().map(|f| f.category.id)
    }

    pub fn is_unread(&self) -> bool {
        self.status == EntryStatus::Unread
    }
}

/// Per-feed read and unread totals from `GET /v1/feeds/counters`.
///
/// The server keys both maps by feed id rendered as a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Counters {
    pub reads: HashMap<i64, i64>,
    pub unreads: HashMap<i64, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EntriesPage {
    pub total: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OriginalContent {
    pub content: String,
    pub reading_time: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub theme: String,
    pub language: String,
    pub timezone: String,
}

/// Fields accepted by `PUT /v1/feeds/{id}`. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedModification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawler: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_globally: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Query string for the entry list endpoints. `None` fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_before: Option<i64>,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_after: Option<i64>,
}

/// Which slice of entries the list is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntrySource {
    #[default]
    All,
    /// Published within the last 24 hours.
    Today,
    Starred,
    /// Entries already read.
    History,
    Feed(i64),
    Category(i64),
}

impl EntrySource {
    /// Path of the list endpoint, relative to the API root.
    pub fn path(self) -> String {
        match self {
            EntrySource::Feed(id) => format!("v1/feeds/{id}/entries"),
            EntrySource::Category(id) => format!("v1/categories/{id}/entries"),
            EntrySource::All | EntrySource::Today | EntrySource::Starred | EntrySource::History => {
                "v1/entries".to_string()
            }
        }
    }

    /// Narrows `query` to this source. Source constraints win over the caller's.
    pub fn constrain(self, mut query: EntryQuery, now: DateTime<Utc>) -> EntryQuery {
        match self {
            EntrySource::Today => {
                let cutoff = (now - Duration::hours(24)).timestamp();
                query.published_after = Some(query.published_after.map_or(cutoff, |a| a.max(cutoff)));
            }
            EntrySource::Starred => query.starred = Some(true),
            EntrySource::History => query.status = Some(EntryStatus::Read),
            EntrySource::All | EntrySource::Feed(_) | EntrySource::Category(_) => {}
        }
        query
    }

    /// Name used for `homePage` and in the UI header.
    pub fn label(self) -> &'static str {
        match self {
            EntrySource::All => "all",
            EntrySource::Today => "today",
            EntrySource::Starred => "starred",
            EntrySource::History => "history",
            EntrySource::Feed(_) => "feed",
            EntrySource::Category(_) => "category",
        }
    }

    /// Parses the `homePage` setting. Unknown values fall back to `All`.
    pub fn from_home_page(value: &str) -> Self {
        match value {
            "today" => EntrySource::Today,
            "starred" => EntrySource::Starred,
            "history" => EntrySource::History,
            _ => EntrySource::All,
        }
    }
}

/// Deserializes JSON `null` as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_decodes_server_shape() {
        let json = r#"{
            "id": 42, "user_id": 1, "feed_id": 7, "status": "unread",
            "hash": "abc", "title": "Hello", "url": "https://example.com/hello",
            "comments_url": "", "published_at": "2024-05-01T10:00:00Z",
            "created_at": "2024-05-01T10:05:00Z", "changed_at": "2024-05-01T10:05:00Z",
            "content": "<p>Hi</p>", "author": "Ann", "share_code": "",
            "starred": true, "reading_time": 3, "enclosures": null,
            "feed": {"id": 7, "title": "Example", "category": {"id": 2, "title": "Tech"}}
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 42);
        assert_eq!(entry.status, EntryStatus::Unread);
        assert!(entry.starred);
        assert_eq!(entry.feed_title(), "Example");
        assert_eq!(entry.category_id(), Some(2));
    }

    #[test]
    fn test_entries_page_null_entries() {
        let page: EntriesPage = serde_json::from_str(r#"{"total": 0, "entries": null}"#).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_counters_string_keys() {
        let counters: Counters =
            serde_json::from_str(r#"{"reads": {"1": 5}, "unreads": {"1": 2, "9": 0}}"#).unwrap();
        assert_eq!(counters.unreads.get(&1), Some(&2));
        assert_eq!(counters.reads.get(&1), Some(&5));
    }

    #[test]
    fn test_query_omits_unset_fields() {
        let query = EntryQuery {
            status: Some(EntryStatus::Unread),
            limit: Some(100),
            ..Default::default()
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, serde_json::json!({"status": "unread", "limit": 100}));
    }

    #[test]
    fn test_source_constraints() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let today = EntrySource::Today.constrain(EntryQuery::default(), now);
        assert_eq!(today.published_after, Some(1_700_000_000 - 86_400));

        let history = EntrySource::History.constrain(
            EntryQuery {
                status: Some(EntryStatus::Unread),
                ..Default::default()
            },
            now,
        );
        assert_eq!(history.status, Some(EntryStatus::Read));

        assert_eq!(EntrySource::Starred.constrain(EntryQuery::default(), now).starred, Some(true));
        assert_eq!(EntrySource::Feed(3).path(), "v1/feeds/3/entries");
        assert_eq!(EntrySource::Category(4).path(), "v1/categories/4/entries");
    }

    #[test]
    fn test_status_toggle() {
        assert_eq!(EntryStatus::Unread.toggled(), EntryStatus::Read);
        assert_eq!(EntryStatus::Read.toggled(), EntryStatus::Unread);
    }
}
