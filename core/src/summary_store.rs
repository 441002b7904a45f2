//! Time-keyed persistence for hourly summaries.
//!
//! RULE: Only this module talks to the database.
//! The engine and the baseline engine go through the SummaryStore
//! trait and never execute SQL directly.
//!
//! Rows are keyed by (series name, timestamp key). Range reads are paged:
//! each page carries an exclusive continuation token, and callers keep
//! asking until no token comes back.

use crate::{
    error::{SimError, SimResult},
    types::{DayType, HourType, HourlySummary, TimestampKey},
};
use rusqlite::{params, Connection};

/// Exclusive start key for the next page of a range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageToken(pub TimestampKey);

#[derive(Debug, Clone, Default)]
pub struct SummaryPage {
    pub rows: Vec<HourlySummary>,
    pub next: Option<PageToken>,
}

/// The external time-keyed store.
pub trait SummaryStore {
    /// Insert or replace the row for (series_name, timestamp_key).
    fn put(&self, summary: &HourlySummary) -> SimResult<()>;

    /// Write several rows in the given order.
    fn put_batch(&self, summaries: &[HourlySummary]) -> SimResult<()> {
        for summary in summaries {
            self.put(summary)?;
        }
        Ok(())
    }

    /// Rows with `from <= timestamp_key <= to`, ascending, at most `limit`
    /// of them, starting after `after` when given.
    fn query_range(
        &self,
        series_name: &str,
        from: TimestampKey,
        to: TimestampKey,
        after: Option<PageToken>,
        limit: usize,
    ) -> SimResult<SummaryPage>;
}

impl<S: SummaryStore + ?Sized> SummaryStore for &S {
    fn put(&self, summary: &HourlySummary) -> SimResult<()> {
        (**self).put(summary)
    }

    fn put_batch(&self, summaries: &[HourlySummary]) -> SimResult<()> {
        (**self).put_batch(summaries)
    }

    fn query_range(
        &self,
        series_name: &str,
        from: TimestampKey,
        to: TimestampKey,
        after: Option<PageToken>,
        limit: usize,
    ) -> SimResult<SummaryPage> {
        (**self).query_range(series_name, from, to, after, limit)
    }
}

pub struct SqliteSummaryStore {
    conn: Connection,
}

impl SqliteSummaryStore {
    /// Open (or create) the summary database at `path`. URI paths such as
    /// `file:name?mode=memory&cache=shared` are accepted.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the summary table if it does not exist yet.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_summary_operations.sql"))?;
        Ok(())
    }

    pub fn row_count(&self, series_name: &str) -> SimResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM summary_operations_per_hour WHERE table_name = ?1",
            params![series_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn insert(conn: &Connection, s: &HourlySummary) -> SimResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO summary_operations_per_hour
                (table_name, time_stamp, creations, updates, deletions, hour_type, day_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                s.series_name,
                s.timestamp_key as i64,
                s.creations as i64,
                s.updates as i64,
                s.deletions as i64,
                s.hour_type.as_str(),
                s.day_type.as_str(),
            ],
        )?;
        Ok(())
    }
}

impl SummaryStore for SqliteSummaryStore {
    fn put(&self, summary: &HourlySummary) -> SimResult<()> {
        Self::insert(&self.conn, summary)
    }

    /// One transaction per batch; rows land in slice order.
    fn put_batch(&self, summaries: &[HourlySummary]) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for summary in summaries {
            Self::insert(&tx, summary)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query_range(
        &self,
        series_name: &str,
        from: TimestampKey,
        to: TimestampKey,
        after: Option<PageToken>,
        limit: usize,
    ) -> SimResult<SummaryPage> {
        if limit == 0 {
            return Err(SimError::config("page size must be at least 1"));
        }
        let mut stmt = self.conn.prepare(
            "SELECT time_stamp, creations, updates, deletions, hour_type, day_type
             FROM summary_operations_per_hour
             WHERE table_name = ?1 AND time_stamp >= ?2 AND time_stamp <= ?3
               AND time_stamp > ?4
             ORDER BY time_stamp ASC
             LIMIT ?5",
        )?;
        let after_key = after.map(|t| t.0 as i64).unwrap_or(-1);
        // One extra row tells us whether another page exists.
        let raw = stmt
            .query_map(
                params![series_name, from as i64, to as i64, after_key, (limit + 1) as i64],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let has_more = raw.len() > limit;
        let mut rows = Vec::with_capacity(raw.len().min(limit));
        for (ts, creations, updates, deletions, hour_type, day_type) in raw.into_iter().take(limit) {
            rows.push(HourlySummary {
                series_name: series_name.to_string(),
                timestamp_key: ts as u64,
                creations: creations as u64,
                updates: updates as u64,
                deletions: deletions as u64,
                hour_type: hour_type.parse::<HourType>().map_err(corrupt_row)?,
                day_type: day_type.parse::<DayType>().map_err(corrupt_row)?,
            });
        }
        let next = if has_more {
            rows.last().map(|r| PageToken(r.timestamp_key))
        } else {
            None
        };
        Ok(SummaryPage { rows, next })
    }
}

fn corrupt_row(reason: String) -> SimError {
    SimError::StoreUnavailable { reason: format!("corrupt summary row: {reason}") }
}
