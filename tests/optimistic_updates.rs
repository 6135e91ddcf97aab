//! Property tests for the optimistic read/unread and star bookkeeping.
//!
//! Local counters are adjusted before the server answers and rolled back on
//! failure. Whatever the sequence, they must never go negative, and a
//! rollback must restore exactly what was there before.

use chrono::{Duration, TimeZone, Utc};
use fluxread::api::{Category, Entry, EntryStatus, Feed};
use fluxread::store::Store;
use fluxread::util::is_within_last_24h;
use proptest::prelude::*;
use std::sync::Arc;

fn feed(id: i64) -> Feed {
    Feed {
        id,
        title: format!("Feed {id}"),
        category: Category {
            id: 1,
            title: "All".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn entry(id: i64, feed_id: i64, unread: bool, age_hours: i64) -> Entry {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    serde_json::from_value(serde_json::json!({
        "id": id,
        "feed_id": feed_id,
        "title": format!("Entry {id}"),
        "published_at": (now - Duration::hours(age_hours)).to_rfc3339(),
        "status": if unread { "unread" } else { "read" },
        "starred": false,
    }))
    .unwrap()
}

fn store(entries: Vec<Entry>, feed_unread: [i64; 3], today: i64, history: i64) -> Store {
    let mut store = Store::default();
    store.data.feeds = Arc::new(vec![feed(1), feed(2), feed(3)]);
    for (i, count) in feed_unread.into_iter().enumerate() {
        store.data.unread_info.insert(i as i64 + 1, count);
    }
    store.data.unread_today_count = today;
    store.data.history_count = history;
    store.content.entries = Arc::new(entries);
    store
}

fn snapshot(store: &Store) -> (Vec<i64>, i64, i64, i64, Vec<EntryStatus>) {
    (
        (1..=3).map(|id| store.data.feed_unread(id)).collect(),
        store.data.unread_today_count,
        store.data.history_count,
        store.data.starred_count,
        store.content.entries.iter().map(|e| e.status).collect(),
    )
}

fn arb_entries() -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec((1i64..=3, any::<bool>(), 0i64..72), 1..20).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (feed_id, unread, age))| entry(i as i64 + 1, feed_id, unread, age))
            .collect()
    })
}

proptest! {
    #[test]
    fn counters_never_negative(
        entries in arb_entries(),
        feed_unread in prop::array::uniform3(0i64..5),
        today in 0i64..5,
        history in 0i64..5,
        ops in prop::collection::vec((any::<prop::sample::Index>(), any::<bool>(), any::<bool>()), 1..30),
    ) {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut store = store(entries, feed_unread, today, history);

        for (index, mark_read, star) in ops {
            let target = index.get(&store.content.entries).clone();
            if star {
                let change = store.apply_starred_update(&target, !target.starred);
                if mark_read {
                    store.revert_starred_change(&change);
                }
            } else {
                let status = if mark_read { EntryStatus::Read } else { EntryStatus::Unread };
                store.apply_status_update(&[target], status, now);
            }

            prop_assert!(store.data.unread_today_count >= 0);
            prop_assert!(store.data.history_count >= 0);
            prop_assert!(store.data.starred_count >= 0);
            for id in 1..=3 {
                prop_assert!(store.data.feed_unread(id) >= 0);
            }
        }
    }

    #[test]
    fn rollback_restores_previous_state(
        entries in arb_entries(),
        feed_unread in prop::array::uniform3(0i64..5),
        today in 0i64..5,
        history in 0i64..5,
        mark_read in any::<bool>(),
    ) {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut store = store(entries, feed_unread, today, history);
        let before = snapshot(&store);

        let targets: Vec<Entry> = store.content.entries.iter().cloned().collect();
        let status = if mark_read { EntryStatus::Read } else { EntryStatus::Unread };
        if let Some(change) = store.apply_status_update(&targets, status, now) {
            prop_assert!(store.content.entries.iter().all(|e| e.status == status));
            store.revert_status_change(&change);
        }

        prop_assert_eq!(snapshot(&store), before);
    }

    #[test]
    fn toggling_status_twice_is_identity(
        entries in arb_entries(),
        slack in prop::array::uniform3(0i64..3),
        pick in any::<prop::sample::Index>(),
    ) {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        // Counters at least as large as what the loaded entries account for.
        let mut feed_unread = slack;
        let mut today = slack[0];
        let mut history = slack[1];
        for e in &entries {
            if e.status == EntryStatus::Unread {
                feed_unread[(e.feed_id - 1) as usize] += 1;
                if is_within_last_24h(e.published_at, now) {
                    today += 1;
                }
            } else {
                history += 1;
            }
        }
        let mut store = store(entries, feed_unread, today, history);
        let before = snapshot(&store);

        let target = pick.get(&store.content.entries).clone();
        let (there, back) = match target.status {
            EntryStatus::Unread => (EntryStatus::Read, EntryStatus::Unread),
            _ => (EntryStatus::Unread, EntryStatus::Read),
        };
        prop_assert!(store.apply_status_update(&[target.clone()], there, now).is_some());
        let moved = store.content.entries.iter().find(|e| e.id == target.id).cloned().unwrap();
        prop_assert!(store.apply_status_update(&[moved], back, now).is_some());

        prop_assert_eq!(snapshot(&store), before);
    }
}

#[test]
fn toggling_star_twice_is_identity() {
    let mut store = store(vec![entry(1, 1, true, 1)], [1, 0, 0], 1, 0);
    let original = store.content.entries[0].clone();

    store.apply_starred_update(&original, true);
    assert_eq!(store.data.starred_count, 1);
    let starred = store.content.entries[0].clone();
    store.apply_starred_update(&starred, false);

    assert_eq!(store.data.starred_count, 0);
    assert_eq!(store.content.entries[0], original);
}

#[test]
fn marking_read_only_counts_today_for_recent_entries() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let entries = vec![entry(1, 1, true, 2), entry(2, 1, true, 48)];
    let mut store = store(entries.clone(), [2, 0, 0], 1, 0);

    let change = store
        .apply_status_update(&entries, EntryStatus::Read, now)
        .unwrap();

    assert_eq!(store.data.feed_unread(1), 0);
    assert_eq!(store.data.unread_today_count, 0);
    assert_eq!(store.data.history_count, 2);
    assert_eq!(change.today_delta, -1);
}
