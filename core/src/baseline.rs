//! Per-bucket statistical baselines over historical hourly summaries.
//!
//! Every call reads the window fresh from the store; nothing is cached
//! between calls. Bands are `mean ± 2·stddev` using the sample (n−1)
//! standard deviation. Lower bounds are NOT clamped at zero: a negative
//! lower bound is returned as computed, and callers that treat negative
//! counts as meaningless must clamp themselves.

use crate::{
    error::{SimError, SimResult},
    summary_store::{PageToken, SummaryStore},
    types::{encode_timestamp, Bucket, HourlySummary, OperationKind, TimestampKey},
};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const MAX_PAGES: usize = 100_000;
pub const BAND_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperationBand {
    pub mean:   f64,
    pub stddev: f64,
    pub lower:  f64,
    pub upper:  f64,
}

impl OperationBand {
    /// Band over `values`. A single value has a stddev of zero.
    pub fn from_samples(values: &[f64]) -> Self {
        let n = values.len();
        let mean = if n == 0 { 0.0 } else { values.iter().sum::<f64>() / n as f64 };
        let variance = if n > 1 {
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let stddev = variance.sqrt();
        Self {
            mean,
            stddev,
            lower: mean - BAND_WIDTH * stddev,
            upper: mean + BAND_WIDTH * stddev,
        }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketBaseline {
    pub bucket:    Bucket,
    pub samples:   usize,
    pub creations: OperationBand,
    pub updates:   OperationBand,
    pub deletions: OperationBand,
}

impl BucketBaseline {
    pub fn band(&self, kind: OperationKind) -> &OperationBand {
        match kind {
            OperationKind::Creations => &self.creations,
            OperationKind::Updates   => &self.updates,
            OperationKind::Deletions => &self.deletions,
        }
    }

    /// Operation kinds whose count in `summary` falls outside the band.
    pub fn outliers(&self, summary: &HourlySummary) -> Vec<OperationKind> {
        OperationKind::ALL
            .into_iter()
            .filter(|kind| !self.band(*kind).contains(summary.count(*kind) as f64))
            .collect()
    }
}

pub type Baselines = BTreeMap<Bucket, BucketBaseline>;

/// Group rows by bucket and derive bands. Buckets without rows are absent.
pub fn baselines_from_rows(rows: &[HourlySummary]) -> Baselines {
    let mut groups: HashMap<Bucket, Vec<&HourlySummary>> = HashMap::new();
    for row in rows {
        groups.entry(row.bucket()).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(bucket, group)| {
            let band = |kind: OperationKind| {
                let values: Vec<f64> = group.iter().map(|r| r.count(kind) as f64).collect();
                OperationBand::from_samples(&values)
            };
            let baseline = BucketBaseline {
                bucket,
                samples: group.len(),
                creations: band(OperationKind::Creations),
                updates: band(OperationKind::Updates),
                deletions: band(OperationKind::Deletions),
            };
            (bucket, baseline)
        })
        .collect()
}

pub struct BaselineEngine<S: SummaryStore> {
    store:       S,
    series_name: String,
    page_size:   usize,
    max_pages:   usize,
}

impl<S: SummaryStore> BaselineEngine<S> {
    pub fn new(store: S, series_name: impl Into<String>) -> Self {
        Self {
            store,
            series_name: series_name.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: MAX_PAGES,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Baselines over summaries whose hour lies in `[window_start, window_end]`.
    ///
    /// Fails with `NoDataInWindow` when the window holds no rows, and with
    /// `PaginationTruncated` when paging cannot be completed; a partial
    /// result is never returned.
    pub fn compute_baselines(
        &self,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) -> SimResult<Baselines> {
        if window_start > window_end {
            return Err(SimError::config(format!(
                "baseline window starts at {window_start} after it ends at {window_end}"
            )));
        }
        let from = encode_timestamp(window_start);
        let to = encode_timestamp(window_end);
        let rows = self.fetch_window(from, to)?;
        if rows.is_empty() {
            return Err(SimError::NoDataInWindow {
                series: self.series_name.clone(),
                from,
                to,
            });
        }
        let baselines = baselines_from_rows(&rows);
        log::info!(
            "baselines series={} window=[{from}, {to}] rows={} buckets={}",
            self.series_name,
            rows.len(),
            baselines.len()
        );
        Ok(baselines)
    }

    /// Baselines over the `days` leading up to `now`.
    pub fn compute_trailing(&self, now: NaiveDateTime, days: i64) -> SimResult<Baselines> {
        let start = Duration::try_days(days)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                SimError::config(format!("trailing window of {days} days before {now} is out of range"))
            })?;
        self.compute_baselines(start, now)
    }

    /// Page through the store until no continuation token comes back.
    pub fn fetch_window(
        &self,
        from: TimestampKey,
        to: TimestampKey,
    ) -> SimResult<Vec<HourlySummary>> {
        let mut rows = Vec::new();
        let mut token: Option<PageToken> = None;
        let mut pages = 0usize;
        loop {
            if pages >= self.max_pages {
                return Err(SimError::PaginationTruncated {
                    pages,
                    reason: format!("page limit of {} reached", self.max_pages),
                });
            }
            let page = self
                .store
                .query_range(&self.series_name, from, to, token, self.page_size)?;
            pages += 1;
            rows.extend(page.rows);
            match page.next {
                None => break,
                Some(next) if token.is_some_and(|prev| next <= prev) => {
                    return Err(SimError::PaginationTruncated {
                        pages,
                        reason: format!("continuation token {} did not advance", next.0),
                    });
                }
                Some(next) => token = Some(next),
            }
        }
        log::debug!("fetched {} summary rows in {pages} pages", rows.len());
        Ok(rows)
    }
}
