//! SQLite summary store: keying, replacement and paged range reads.

use opsim_core::{
    summary_store::{PageToken, SqliteSummaryStore, SummaryStore},
    types::{DayType, HourType, HourlySummary},
};

fn summary(series: &str, ts: u64, creations: u64) -> HourlySummary {
    HourlySummary {
        series_name: series.into(),
        timestamp_key: ts,
        creations,
        updates: 3,
        deletions: 1,
        hour_type: HourType::Inactive,
        day_type: DayType::Weekday,
    }
}

fn open() -> SqliteSummaryStore {
    let store = SqliteSummaryStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

#[test]
fn migrate_is_idempotent() {
    let store = open();
    store.migrate().expect("second migration");
    assert_eq!(store.row_count("anything").unwrap(), 0);
}

#[test]
fn one_row_per_series_and_timestamp() {
    let store = open();
    store.put(&summary("A", 202_406_030_100, 10)).unwrap();
    store.put(&summary("A", 202_406_030_100, 99)).unwrap();
    store.put(&summary("B", 202_406_030_100, 5)).unwrap();

    assert_eq!(store.row_count("A").unwrap(), 1);
    assert_eq!(store.row_count("B").unwrap(), 1);

    let page = store.query_range("A", 0, u64::MAX >> 1, None, 10).unwrap();
    assert_eq!(page.rows, vec![summary("A", 202_406_030_100, 99)]);
    assert!(page.next.is_none());
}

#[test]
fn range_reads_are_inclusive_ascending_and_paged() {
    let store = open();
    let keys = [202_406_030_000u64, 202_406_030_100, 202_406_030_200, 202_406_030_300, 202_406_030_400];
    // Insert out of order; reads must come back sorted.
    for &k in keys.iter().rev() {
        store.put(&summary("A", k, k % 1000)).unwrap();
    }

    let first = store.query_range("A", keys[1], keys[3], None, 2).unwrap();
    let got: Vec<u64> = first.rows.iter().map(|r| r.timestamp_key).collect();
    assert_eq!(got, vec![keys[1], keys[2]]);
    assert_eq!(first.next, Some(PageToken(keys[2])));

    let second = store.query_range("A", keys[1], keys[3], first.next, 2).unwrap();
    let got: Vec<u64> = second.rows.iter().map(|r| r.timestamp_key).collect();
    assert_eq!(got, vec![keys[3]]);
    assert!(second.next.is_none());
}

#[test]
fn zero_page_size_is_rejected() {
    let store = open();
    assert!(store.query_range("A", 0, 1, None, 0).is_err());
}

#[test]
fn unmigrated_store_reports_unavailable() {
    let store = SqliteSummaryStore::in_memory().unwrap();
    let err = store.put(&summary("A", 1, 1)).unwrap_err();
    assert!(matches!(err, opsim_core::error::SimError::StoreUnavailable { .. }), "got {err:?}");
}
