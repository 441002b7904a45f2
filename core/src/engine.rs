//! The simulation engine: one step per simulated hour.
//!
//! EXECUTION ORDER within an hour (fixed, never reordered):
//!   1. Classify the hour into its (day_type, hour_type) bucket.
//!   2. Draw (creations, updates, deletions) from the rate model.
//!   3. Create the batch, then apply every update, then every delete.
//!      Records created this hour are eligible for this hour's
//!      updates and deletes.
//!   4. Build the HourlySummary and hand it to the sink.
//!   5. Advance the clock by exactly one hour.
//!
//! RULES:
//!   - The engine owns the whole simulation context; nothing is global.
//!   - All randomness flows through the RngBank.
//!   - A failed hour is rolled back and aborts the run. There is no
//!     resume; build a new engine instead.

use crate::{
    clock::HourClock,
    config::SimConfig,
    error::{SimError, SimResult},
    export,
    rate_model::{HourlyCounts, RateModel},
    record_store::RecordStore,
    rng::{RngBank, SimRng, StreamSlot},
    sink::SummarySink,
    types::{encode_timestamp, Bucket, HourlySummary, RunId, TimestampKey},
};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::time::Instant;

/// Operations actually applied in one hour. Updates and deletes that found
/// no live record are counted as skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppliedCounts {
    pub created:         u64,
    pub updated:         u64,
    pub deleted:         u64,
    pub updates_skipped: u64,
    pub deletes_skipped: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id:          RunId,
    pub seed:            u64,
    pub hours:           u64,
    pub created:         u64,
    pub updated:         u64,
    pub deleted:         u64,
    pub updates_skipped: u64,
    pub deletes_skipped: u64,
    pub live_records:    usize,
    pub deleted_records: usize,
}

pub struct SimEngine<K: SummarySink> {
    pub run_id:  RunId,
    pub clock:   HourClock,
    config:      SimConfig,
    rng_bank:    RngBank,
    rate_rng:    SimRng,
    record_rng:  SimRng,
    rate_model:  RateModel,
    records:     RecordStore,
    summaries:   Vec<HourlySummary>,
    totals:      AppliedCounts,
    sink:        K,
    aborted_at:  Option<TimestampKey>,
    started:     Instant,
    day_started: Instant,
}

impl<K: SummarySink> SimEngine<K> {
    /// Validate `config` and build a fully wired engine.
    /// Invalid configuration fails here, before any hour is simulated.
    pub fn build(run_id: RunId, seed: u64, config: SimConfig, sink: K) -> SimResult<Self> {
        config.validate()?;
        let rng_bank = RngBank::new(seed);
        let mut records = RecordStore::new(
            config.fields.clone(),
            &config.updatable_fields,
            config.id_start,
        )?;
        if let Some(path) = &config.initial_records {
            let loaded = export::read_records_csv(path, &config.fields)?;
            let count = records.load_records(loaded)?;
            log::info!(
                "run={run_id} starting from {count} existing records ({} live)",
                records.live_count()
            );
        }
        log::info!(
            "run={run_id} seed={seed} series={} start={} days={} fields={}",
            config.series_name,
            config.start,
            config.num_days,
            config.fields.len()
        );
        Ok(Self {
            clock: HourClock::new(config.start, config.total_hours()),
            rate_rng: rng_bank.for_stream(StreamSlot::Rates),
            record_rng: rng_bank.for_stream(StreamSlot::Records),
            rate_model: RateModel::new(config.rates.clone()),
            records,
            summaries: Vec::new(),
            totals: AppliedCounts::default(),
            sink,
            aborted_at: None,
            started: Instant::now(),
            day_started: Instant::now(),
            rng_bank,
            config,
            run_id,
        })
    }

    /// Simulate the next hour with counts drawn from the rate model.
    /// Returns `None` once the window is exhausted.
    pub fn step(&mut self) -> SimResult<Option<HourlySummary>> {
        let Some(at) = self.clock.current() else {
            return Ok(None);
        };
        self.ensure_not_aborted()?;
        let bucket = self.bucket_for(at);
        let counts = match self
            .rate_model
            .sample(bucket.day_type, bucket.hour_type, &mut self.rate_rng)
        {
            Ok(counts) => counts,
            Err(e) => return Err(self.abort(at, e)),
        };
        self.step_with_counts(counts).map(Some)
    }

    /// Simulate the next hour with explicit counts.
    ///
    /// The hour is atomic: if any part fails, every record mutation made
    /// during it is rolled back, no summary is recorded, and the engine
    /// refuses further steps.
    pub fn step_with_counts(&mut self, counts: HourlyCounts) -> SimResult<HourlySummary> {
        self.ensure_not_aborted()?;
        let at = self.clock.current().ok_or_else(|| {
            SimError::config(format!(
                "simulation window of {} hours is already exhausted",
                self.clock.total_steps
            ))
        })?;
        let bucket = self.bucket_for(at);

        self.records.begin_hour();
        let applied = match self.apply_hour(at, counts) {
            Ok(applied) => applied,
            Err(e) => return Err(self.abort(at, e)),
        };

        let summary = HourlySummary {
            series_name:   self.config.series_name.clone(),
            timestamp_key: encode_timestamp(at),
            creations:     counts.creations,
            updates:       counts.updates,
            deletions:     counts.deletions,
            hour_type:     bucket.hour_type,
            day_type:      bucket.day_type,
        };
        if let Err(e) = self.sink.write(&summary) {
            return Err(self.abort(at, e));
        }
        self.records.commit_hour();

        if applied.updates_skipped + applied.deletes_skipped > 0 {
            log::warn!(
                "hour={} no live records: skipped {} updates, {} deletes",
                summary.timestamp_key,
                applied.updates_skipped,
                applied.deletes_skipped
            );
        }
        log::debug!(
            "hour={} bucket={bucket} c={} u={} d={} live={}",
            summary.timestamp_key,
            counts.creations,
            counts.updates,
            counts.deletions,
            self.records.live_count()
        );

        self.accumulate(applied);
        self.summaries.push(summary.clone());
        let steps = self.clock.advance();
        if steps % 24 == 0 {
            log::info!(
                "run={} day {} complete in {} ms: {} hours, {} records ({} live)",
                self.run_id,
                steps / 24,
                self.day_started.elapsed().as_millis(),
                steps,
                self.records.len(),
                self.records.live_count()
            );
            self.day_started = Instant::now();
        }
        Ok(summary)
    }

    /// Run every remaining hour, then flush the sink.
    pub fn run(&mut self) -> SimResult<RunReport> {
        while self.step()?.is_some() {}
        self.sink.flush()?;
        let report = self.report();
        log::info!(
            "run={} finished in {} ms: {} hours, created={} updated={} deleted={} live={}",
            report.run_id,
            self.started.elapsed().as_millis(),
            report.hours,
            report.created,
            report.updated,
            report.deleted,
            report.live_records
        );
        Ok(report)
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            run_id:          self.run_id.clone(),
            seed:            self.rng_bank.seed(),
            hours:           self.clock.steps_taken(),
            created:         self.totals.created,
            updated:         self.totals.updated,
            deleted:         self.totals.deleted,
            updates_skipped: self.totals.updates_skipped,
            deletes_skipped: self.totals.deletes_skipped,
            live_records:    self.records.live_count(),
            deleted_records: self.records.deleted_count(),
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Every summary emitted so far, in timestamp order.
    pub fn summaries(&self) -> &[HourlySummary] {
        &self.summaries
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted_at.is_some()
    }

    /// Start of the hour the next step would simulate.
    pub fn current_hour(&self) -> Option<NaiveDateTime> {
        self.clock.current()
    }

    // ── Internals ──────────────────────────────────────────────

    fn bucket_for(&self, at: NaiveDateTime) -> Bucket {
        Bucket::classify(at, self.config.active_start, self.config.inactive_start)
    }

    fn apply_hour(&mut self, at: NaiveDateTime, counts: HourlyCounts) -> SimResult<AppliedCounts> {
        let mut applied = AppliedCounts::default();

        let batch = usize::try_from(counts.creations).map_err(|_| {
            SimError::config(format!("{} creations do not fit in one batch", counts.creations))
        })?;
        let created = self.records.create_batch(batch, at, &mut self.record_rng)?;
        applied.created = created.len() as u64;

        for _ in 0..counts.updates {
            if self.records.update_one(at, &mut self.record_rng)? {
                applied.updated += 1;
            } else {
                applied.updates_skipped += 1;
            }
        }
        for _ in 0..counts.deletions {
            if self.records.delete_one(at, &mut self.record_rng) {
                applied.deleted += 1;
            } else {
                applied.deletes_skipped += 1;
            }
        }
        Ok(applied)
    }

    fn accumulate(&mut self, applied: AppliedCounts) {
        self.totals.created += applied.created;
        self.totals.updated += applied.updated;
        self.totals.deleted += applied.deleted;
        self.totals.updates_skipped += applied.updates_skipped;
        self.totals.deletes_skipped += applied.deletes_skipped;
    }

    fn abort(&mut self, at: NaiveDateTime, err: SimError) -> SimError {
        self.records.rollback_hour();
        let key = encode_timestamp(at);
        self.aborted_at = Some(key);
        log::error!("run={} aborted at hour {key}: {err}", self.run_id);
        err
    }

    fn ensure_not_aborted(&self) -> SimResult<()> {
        match self.aborted_at {
            Some(timestamp_key) => Err(SimError::RunAborted { timestamp_key }),
            None => Ok(()),
        }
    }
}
