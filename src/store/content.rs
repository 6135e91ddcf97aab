use crate::api::{EntriesPage, Entry, EntrySource, EntryStatus};
use crate::settings::RemoveDuplicates;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;

/// The entry list pane and the article open in the detail pane.
///
/// `entries` is shared with render code through an `Arc`; mutations go
/// through `Arc::make_mut`, which only clones when a renderer still holds
/// the old list.
#[derive(Debug, Clone, Default)]
pub struct ContentState {
    pub entries: Arc<Vec<Entry>>,
    /// Article shown in the detail pane. A copy, so it survives a list reload.
    pub active: Option<Entry>,
    pub source: EntrySource,
    pub filter_string: String,
    /// Restricts the list to one calendar day.
    pub filter_date: Option<NaiveDate>,
    /// Entries reported by the server for the current query.
    pub total: u64,
    /// Set once the first page for the current source arrived.
    pub loaded: bool,
    pub loading_more: bool,
    pub selected: usize,
    /// Bumped on every list reload; responses carrying an older value are dropped.
    pub generation: u64,
}

impl ContentState {
    /// Switches the list to `source` and clears filters. Returns the new generation.
    pub fn set_source(&mut self, source: EntrySource) -> u64 {
        self.source = source;
        self.filter_string.clear();
        self.filter_date = None;
        self.begin_reload()
    }

    /// Invalidates in-flight loads and resets pagination.
    pub fn begin_reload(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.loaded = false;
        self.loading_more = false;
        self.generation
    }

    /// Installs the first page of a reload. Returns `false` for a stale page.
    pub fn replace_entries(
        &mut self,
        generation: u64,
        page: EntriesPage,
        dedupe: RemoveDuplicates,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "Dropping stale entry page");
            return false;
        }
        let mut seen = HashSet::new();
        self.entries = Arc::new(
            page.entries
                .into_iter()
                .filter(|e| keep_unique(e, dedupe, &mut seen))
                .collect(),
        );
        self.total = page.total;
        self.loaded = true;
        self.loading_more = false;
        self.selected = 0;
        true
    }

    /// Appends a "load more" page, skipping ids already listed.
    pub fn append_entries(
        &mut self,
        generation: u64,
        page: EntriesPage,
        dedupe: RemoveDuplicates,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        let mut ids: HashSet<i64> = self.entries.iter().map(|e| e.id).collect();
        let mut seen = HashSet::new();
        for existing in self.entries.iter() {
            keep_unique(existing, dedupe, &mut seen);
        }
        let entries = Arc::make_mut(&mut self.entries);
        for entry in page.entries {
            if ids.insert(entry.id) && keep_unique(&entry, dedupe, &mut seen) {
                entries.push(entry);
            }
        }
        self.total = page.total;
        self.loading_more = false;
        true
    }

    /// Offset of the next page to request.
    pub fn next_offset(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn has_more(&self) -> bool {
        self.loaded && (self.entries.len() as u64) < self.total
    }

    pub fn selected_entry(&self) -> Option<&Entry> {
        self.entries.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
    }

    /// Status of a listed entry, or of the active article.
    pub fn current_status(&self, entry_id: i64) -> Option<EntryStatus> {
        self.entries
            .iter()
            .chain(self.active.as_ref())
            .find(|e| e.id == entry_id)
            .map(|e| e.status)
    }

    pub fn position_of(&self, entry_id: i64) -> Option<usize> {
        self.entries.iter().position(|e| e.id == entry_id)
    }

    /// Entry next to the active article: `+1` for the following one, `-1` for the previous.
    pub fn adjacent_to_active(&self, step: isize) -> Option<&Entry> {
        let active = self.active.as_ref()?;
        let idx = self.position_of(active.id)?;
        let target = idx.checked_add_signed(step)?;
        self.entries.get(target)
    }

    /// Opens `entry` in the detail pane and moves the cursor to it.
    pub fn activate(&mut self, entry: Entry) {
        if let Some(idx) = self.position_of(entry.id) {
            self.selected = idx;
        }
        self.active = Some(entry);
    }

    /// Applies `f` to the listed entry with `entry_id` and to the active copy.
    pub fn update_entry(&mut self, entry_id: i64, mut f: impl FnMut(&mut Entry)) {
        if let Some(idx) = self.position_of(entry_id) {
            f(&mut Arc::make_mut(&mut self.entries)[idx]);
        }
        if let Some(active) = self.active.as_mut().filter(|a| a.id == entry_id) {
            f(active);
        }
    }

    /// Applies `f` to every listed entry matching `pred`, and the active copy if it matches.
    pub fn update_where(&mut self, pred: impl Fn(&Entry) -> bool, f: impl Fn(&mut Entry)) {
        if self.entries.iter().any(&pred) {
            for entry in Arc::make_mut(&mut self.entries).iter_mut().filter(|e| pred(e)) {
                f(entry);
            }
        }
        if let Some(active) = self.active.as_mut().filter(|a| pred(a)) {
            f(active);
        }
    }
}

fn keep_unique(entry: &Entry, dedupe: RemoveDuplicates, seen: &mut HashSet<String>) -> bool {
    let key = match dedupe {
        RemoveDuplicates::None => return true,
        RemoveDuplicates::Title => entry.title.trim(),
        RemoveDuplicates::Url => entry.url.trim(),
        RemoveDuplicates::Hash => entry.hash.as_str(),
    };
    if key.is_empty() {
        return true;
    }
    seen.insert(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::entry;

    fn page(entries: Vec<Entry>, total: u64) -> EntriesPage {
        EntriesPage { total, entries }
    }

    #[test]
    fn test_stale_page_is_dropped() {
        let mut state = ContentState::default();
        let old = state.begin_reload();
        let current = state.begin_reload();
        assert!(!state.replace_entries(old, page(vec![entry(1, 10)], 1), RemoveDuplicates::None));
        assert!(state.entries.is_empty());
        assert!(state.replace_entries(current, page(vec![entry(1, 10)], 1), RemoveDuplicates::None));
        assert_eq!(state.entries.len(), 1);
        assert!(state.loaded);
    }

    #[test]
    fn test_duplicate_titles_removed() {
        let mut state = ContentState::default();
        let generation = state.begin_reload();
        let mut a = entry(1, 10);
        let mut b = entry(2, 11);
        let c = entry(3, 12);
        a.title = "Same".into();
        b.title = " Same ".into();
        state.replace_entries(generation, page(vec![a, b, c], 3), RemoveDuplicates::Title);
        let ids: Vec<i64> = state.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_append_skips_known_ids_and_tracks_more() {
        let mut state = ContentState::default();
        let generation = state.begin_reload();
        state.replace_entries(generation, page(vec![entry(1, 10), entry(2, 10)], 4), RemoveDuplicates::None);
        assert!(state.has_more());
        assert_eq!(state.next_offset(), 2);

        state.append_entries(generation, page(vec![entry(2, 10), entry(3, 10)], 3), RemoveDuplicates::None);
        let ids: Vec<i64> = state.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!state.has_more());
    }

    #[test]
    fn test_set_source_clears_filters() {
        let mut state = ContentState {
            filter_string: "rust".into(),
            filter_date: NaiveDate::from_ymd_opt(2024, 1, 2),
            ..Default::default()
        };
        let before = state.generation;
        let generation = state.set_source(EntrySource::Starred);
        assert_eq!(generation, before + 1);
        assert!(state.filter_string.is_empty());
        assert!(state.filter_date.is_none());
        assert_eq!(state.source, EntrySource::Starred);
    }

    #[test]
    fn test_adjacent_to_active() {
        let mut state = ContentState::default();
        let generation = state.begin_reload();
        state.replace_entries(
            generation,
            page(vec![entry(1, 10), entry(2, 10), entry(3, 10)], 3),
            RemoveDuplicates::None,
        );
        state.activate(entry(2, 10));
        assert_eq!(state.selected, 1);
        assert_eq!(state.adjacent_to_active(1).map(|e| e.id), Some(3));
        assert_eq!(state.adjacent_to_active(-1).map(|e| e.id), Some(1));

        state.activate(entry(1, 10));
        assert!(state.adjacent_to_active(-1).is_none());
    }

    #[test]
    fn test_update_entry_touches_active_copy() {
        let mut state = ContentState::default();
        let generation = state.begin_reload();
        state.replace_entries(generation, page(vec![entry(1, 10)], 1), RemoveDuplicates::None);
        state.activate(entry(1, 10));
        state.update_entry(1, |e| e.starred = true);
        assert!(state.entries[0].starred);
        assert!(state.active.as_ref().is_some_and(|a| a.starred));
    }
}
