//! Optimistic mutations of the local store.
//!
//! Each `apply_*` function changes local state immediately and returns a
//! record of what it changed; the matching `revert_*` function undoes
//! exactly that record once the server rejects the change. Counters are
//! clamped at zero on the way in and on the way back, and the record holds
//! the clamped deltas, so a revert lands on the pre-update values.

use super::data::adjust_clamped;
use super::Store;
use crate::api::{Counters, Entry, EntryQuery, EntrySource, EntryStatus, OriginalContent};
use crate::settings::ShowStatus;
use crate::util::is_within_last_24h;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};

/// What [`Store::apply_status_update`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub new_status: EntryStatus,
    pub previous: Vec<PreviousStatus>,
    pub history_delta: i64,
    pub today_delta: i64,
    /// Feed id → unread delta actually applied.
    pub feed_deltas: BTreeMap<i64, i64>,
}

/// An entry touched by a [`StatusChange`], as it was before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviousStatus {
    pub entry_id: i64,
    pub feed_id: i64,
    pub status: EntryStatus,
    /// Counted in the unread-today total.
    pub recent: bool,
}

impl StatusChange {
    pub fn entry_ids(&self) -> Vec<i64> {
        self.previous.iter().map(|p| p.entry_id).collect()
    }
}

/// What [`Store::apply_starred_update`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarChange {
    pub entry_id: i64,
    pub starred: bool,
    pub was_starred: bool,
    pub count_delta: i64,
}

/// The part of an applied `delta` owed to `count` entries. Clamping may
/// have applied less than one step per entry, so it never exceeds `delta`.
fn share_of(delta: i64, count: i64) -> i64 {
    delta.signum() * count.min(delta.abs())
}

/// Bulk "mark as read" choices offered in the entry list footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkReadScope {
    All,
    OlderThanDay,
    OlderThanTwoDays,
    OlderThanThreeDays,
    OlderThanWeek,
    OlderThanTwoWeeks,
}

impl MarkReadScope {
    pub const ALL: [MarkReadScope; 6] = [
        MarkReadScope::All,
        MarkReadScope::OlderThanDay,
        MarkReadScope::OlderThanTwoDays,
        MarkReadScope::OlderThanThreeDays,
        MarkReadScope::OlderThanWeek,
        MarkReadScope::OlderThanTwoWeeks,
    ];

    /// Scopes available for `source`. Starred and history lists have none.
    pub fn options_for(source: EntrySource) -> &'static [MarkReadScope] {
        match source {
            EntrySource::Starred | EntrySource::History => &[],
            EntrySource::Today => &Self::ALL[..1],
            EntrySource::All | EntrySource::Feed(_) | EntrySource::Category(_) => &Self::ALL,
        }
    }

    fn age(self) -> Option<Duration> {
        match self {
            MarkReadScope::All => None,
            MarkReadScope::OlderThanDay => Some(Duration::days(1)),
            MarkReadScope::OlderThanTwoDays => Some(Duration::days(2)),
            MarkReadScope::OlderThanThreeDays => Some(Duration::days(3)),
            MarkReadScope::OlderThanWeek => Some(Duration::days(7)),
            MarkReadScope::OlderThanTwoWeeks => Some(Duration::days(14)),
        }
    }

    /// Entries published at or before this instant are covered. `None` covers all.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.age().map(|age| now - age)
    }

    pub fn label(self) -> &'static str {
        match self {
            MarkReadScope::All => "Mark all as read",
            MarkReadScope::OlderThanDay => "Older than 1 day",
            MarkReadScope::OlderThanTwoDays => "Older than 2 days",
            MarkReadScope::OlderThanThreeDays => "Older than 3 days",
            MarkReadScope::OlderThanWeek => "Older than 1 week",
            MarkReadScope::OlderThanTwoWeeks => "Older than 2 weeks",
        }
    }

    pub fn confirm_prompt(self, source: EntrySource) -> &'static str {
        match (self, source) {
            (MarkReadScope::All, EntrySource::Today) => "Mark all of today's entries as read?",
            (MarkReadScope::All, _) => "Mark all entries as read?",
            (MarkReadScope::OlderThanDay, _) => "Mark entries older than 1 day as read?",
            (MarkReadScope::OlderThanTwoDays, _) => "Mark entries older than 2 days as read?",
            (MarkReadScope::OlderThanThreeDays, _) => "Mark entries older than 3 days as read?",
            (MarkReadScope::OlderThanWeek, _) => "Mark entries older than 1 week as read?",
            (MarkReadScope::OlderThanTwoWeeks, _) => "Mark entries older than 2 weeks as read?",
        }
    }
}

/// Server work behind a bulk mark-as-read.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkMarkRequest {
    /// `PUT /v1/users/{id}/mark-all-as-read`.
    Everything,
    Feed(i64),
    Category(i64),
    /// Collect unread ids matching the query, then mark them read.
    Query { source: EntrySource, query: EntryQuery },
}

/// Chooses how the server should apply a bulk mark-as-read.
///
/// A whole-source request uses the source's mark-all endpoint unless a date
/// filter is active. Age-limited requests and today's list go through an
/// id query. Returns `None` where bulk marking is not offered.
pub fn plan_bulk_mark(
    source: EntrySource,
    scope: MarkReadScope,
    date_filtered: bool,
    show_status: ShowStatus,
    now: DateTime<Utc>,
) -> Option<BulkMarkRequest> {
    if !MarkReadScope::options_for(source).contains(&scope) {
        return None;
    }
    let cutoff = scope.cutoff(now);
    if cutoff.is_none() && !date_filtered {
        return Some(match source {
            EntrySource::All => BulkMarkRequest::Everything,
            EntrySource::Feed(id) => BulkMarkRequest::Feed(id),
            EntrySource::Category(id) => BulkMarkRequest::Category(id),
            _ => BulkMarkRequest::Query {
                source,
                query: EntryQuery {
                    status: Some(EntryStatus::Unread),
                    ..Default::default()
                },
            },
        });
    }
    let starred = matches!(source, EntrySource::Feed(_) | EntrySource::Category(_))
        && show_status == ShowStatus::Starred;
    Some(BulkMarkRequest::Query {
        source,
        query: EntryQuery {
            status: Some(EntryStatus::Unread),
            starred: starred.then_some(true),
            published_before: cutoff.map(|c| c.timestamp()),
            ..Default::default()
        },
    })
}

impl Store {
    /// Marks `entries` as `new_status` locally.
    ///
    /// Entries already in that status are ignored; `None` means nothing
    /// changed. Today's counter only moves for entries published in the
    /// last 24 hours.
    pub fn apply_status_update(
        &mut self,
        entries: &[Entry],
        new_status: EntryStatus,
        now: DateTime<Utc>,
    ) -> Option<StatusChange> {
        let affected: Vec<&Entry> = entries.iter().filter(|e| e.status != new_status).collect();
        if affected.is_empty() {
            return None;
        }

        let step: i64 = if new_status == EntryStatus::Read { -1 } else { 1 };
        let count = affected.len() as i64;
        let data = &mut self.data;

        let history_delta = adjust_clamped(&mut data.history_count, -step * count);

        let mut raw_feed: BTreeMap<i64, i64> = BTreeMap::new();
        let mut raw_today = 0;
        for entry in &affected {
            *raw_feed.entry(entry.feed_id).or_insert(0) += step;
            if is_within_last_24h(entry.published_at, now) {
                raw_today += step;
            }
        }
        let today_delta = adjust_clamped(&mut data.unread_today_count, raw_today);
        let feed_deltas = raw_feed
            .into_iter()
            .map(|(feed_id, delta)| (feed_id, data.adjust_feed_unread(feed_id, delta)))
            .collect();

        let ids: HashSet<i64> = affected.iter().map(|e| e.id).collect();
        let previous = affected
            .iter()
            .map(|e| PreviousStatus {
                entry_id: e.id,
                feed_id: e.feed_id,
                status: e.status,
                recent: is_within_last_24h(e.published_at, now),
            })
            .collect();
        self.content
            .update_where(|e| ids.contains(&e.id), |e| e.status = new_status);

        tracing::debug!(count, status = %new_status, "Applied status update locally");
        Some(StatusChange {
            new_status,
            previous,
            history_delta,
            today_delta,
            feed_deltas,
        })
    }

    /// Undoes a [`StatusChange`] after the server rejected it.
    ///
    /// Entries a later change already moved away from `new_status` are left
    /// alone, and so is their share of the counters. An entry no longer
    /// loaded counts as unchanged.
    pub fn revert_status_change(&mut self, change: &StatusChange) {
        let pending: Vec<&PreviousStatus> = change
            .previous
            .iter()
            .filter(|p| {
                self.content
                    .current_status(p.entry_id)
                    .is_none_or(|s| s == change.new_status)
            })
            .collect();
        if pending.is_empty() {
            return;
        }

        let mut feed_counts: BTreeMap<i64, i64> = BTreeMap::new();
        let mut recent = 0;
        for p in &pending {
            *feed_counts.entry(p.feed_id).or_insert(0) += 1;
            recent += i64::from(p.recent);
        }

        let data = &mut self.data;
        adjust_clamped(
            &mut data.history_count,
            -share_of(change.history_delta, pending.len() as i64),
        );
        adjust_clamped(
            &mut data.unread_today_count,
            -share_of(change.today_delta, recent),
        );
        for (feed_id, count) in feed_counts {
            let applied = change.feed_deltas.get(&feed_id).copied().unwrap_or(0);
            data.adjust_feed_unread(feed_id, -share_of(applied, count));
        }
        for p in pending {
            let status = p.status;
            self.content.update_entry(p.entry_id, |e| e.status = status);
        }
    }

    /// Sets the starred flag of `entry` locally.
    pub fn apply_starred_update(&mut self, entry: &Entry, starred: bool) -> StarChange {
        let count_delta = adjust_clamped(&mut self.data.starred_count, if starred { 1 } else { -1 });
        self.content.update_entry(entry.id, |e| e.starred = starred);
        StarChange {
            entry_id: entry.id,
            starred,
            was_starred: entry.starred,
            count_delta,
        }
    }

    pub fn revert_starred_change(&mut self, change: &StarChange) {
        adjust_clamped(&mut self.data.starred_count, -change.count_delta);
        let was = change.was_starred;
        self.content.update_entry(change.entry_id, |e| e.starred = was);
    }

    /// Marks listed unread entries read, all of them or those published at
    /// or before `cutoff`. Returns how many changed.
    pub fn mark_entries_read_locally(&mut self, cutoff: Option<DateTime<Utc>>) -> usize {
        let matches = |e: &Entry| e.is_unread() && cutoff.is_none_or(|c| e.published_at <= c);
        let count = self.content.entries.iter().filter(|e| matches(e)).count();
        self.content.update_where(matches, |e| e.status = EntryStatus::Read);
        count
    }

    /// Local side of a finished bulk mark-as-read: list entries, fresh
    /// server counters, and today's count when all of today was marked.
    pub fn finish_bulk_mark(&mut self, cutoff: Option<DateTime<Utc>>, counters: &Counters) {
        let marked = self.mark_entries_read_locally(cutoff);
        self.data.apply_counters(counters);
        if self.content.source == EntrySource::Today && cutoff.is_none() {
            self.data.unread_today_count = 0;
        }
        tracing::info!(marked, source = self.content.source.label(), "Bulk mark as read applied");
    }

    /// Zeroes a feed's unread count and marks its listed entries read.
    pub fn mark_feed_read_locally(&mut self, feed_id: i64) {
        self.data.unread_info.insert(feed_id, 0);
        if matches!(self.content.source, EntrySource::Feed(id) if id == feed_id) {
            self.mark_entries_read_locally(None);
        }
    }

    /// Zeroes the unread counts of a category's feeds and marks the list
    /// read when it shows that category or one of its feeds.
    pub fn mark_category_read_locally(&mut self, category_id: i64) {
        let feed_ids = self.data.feed_ids_in_category(category_id);
        for id in &feed_ids {
            self.data.unread_info.insert(*id, 0);
        }
        let showing = match self.content.source {
            EntrySource::Category(id) => id == category_id,
            EntrySource::Feed(id) => feed_ids.contains(&id),
            _ => false,
        };
        if showing {
            self.mark_entries_read_locally(None);
        }
    }

    /// Installs the scraped original article. A missing reading time keeps the old one.
    pub fn apply_original_content(&mut self, entry_id: i64, original: OriginalContent) {
        let OriginalContent {
            content,
            reading_time,
        } = original;
        self.content.update_entry(entry_id, |e| {
            e.content = content.clone();
            if reading_time > 0 {
                e.reading_time = reading_time;
            }
        });
    }

    /// Replaces the body of the active article, e.g. with a summary.
    pub fn replace_active_content(&mut self, entry_id: i64, html: String) -> bool {
        match self.content.active.as_mut().filter(|a| a.id == entry_id) {
            Some(active) => {
                active.content = html;
                true
            }
            None => false,
        }
    }
}
