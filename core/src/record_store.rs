//! In-memory population of synthetic logistics records.
//!
//! RULE: RecordStore owns its collection exclusively. Callers create,
//! update and soft-delete through the methods below; nothing reaches
//! into the backing vectors.
//!
//! Live records are tracked in a separate position index so that random
//! selection is O(1) while staying uniform over currently-live records.
//! A soft-deleted record leaves the index and is never selected again.

use crate::{
    config::FieldSchema,
    error::{SimError, SimResult},
    field_sampler::{sample_field, sample_value, FieldValue},
    rng::SimRng,
    types::RecordId,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

const PREALLOC_LIMIT: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticRecord {
    pub id:          RecordId,
    /// One slot per schema field, in schema order. `None` is a null.
    pub attributes:  Vec<Option<FieldValue>>,
    pub created_at:  NaiveDateTime,
    pub modified_at: NaiveDateTime,
    pub is_deleted:  bool,
    /// Date of the most recent mutation.
    pub bucket_day:  NaiveDate,
    /// Hour (0–23) of the most recent mutation.
    pub bucket_hour: u32,
}

impl SyntheticRecord {
    fn touch(&mut self, at: NaiveDateTime, hour_start: NaiveDateTime) {
        // Never move backwards; a same-hour update may roll an earlier minute.
        self.modified_at = at.max(self.modified_at);
        self.bucket_day = hour_start.date();
        self.bucket_hour = hour_start.hour();
    }
}

/// Pre-mutation state captured while an hour is in flight.
#[derive(Debug, Default)]
struct HourJournal {
    records_len: usize,
    touched:     Vec<(usize, SyntheticRecord)>,
    left_live:   Vec<usize>,
}

pub struct RecordStore {
    schema:    Vec<FieldSchema>,
    /// Schema positions of the fields an update may rewrite.
    updatable: Vec<usize>,
    records:   Vec<SyntheticRecord>,
    /// Positions into `records` of every live record, unordered.
    live:      Vec<usize>,
    next_id:   RecordId,
    journal:   Option<HourJournal>,
}

impl RecordStore {
    pub fn new(schema: Vec<FieldSchema>, updatable_fields: &[String], id_start: RecordId) -> SimResult<Self> {
        let updatable = updatable_fields
            .iter()
            .map(|name| {
                schema.iter().position(|f| &f.name == name).ok_or_else(|| {
                    SimError::config(format!("updatable field '{name}' is not in the field schema"))
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        if updatable.is_empty() {
            return Err(SimError::config("at least one updatable field is required"));
        }
        Ok(Self {
            schema,
            updatable,
            records: Vec::new(),
            live: Vec::new(),
            next_id: id_start,
            journal: None,
        })
    }

    /// Seed an empty store with an existing population.
    ///
    /// Records are ordered by id; soft-deleted ones stay out of the live
    /// index. Every loaded id must lie below the store's next identity, so
    /// fresh ids never collide with loaded ones.
    pub fn load_records(&mut self, mut loaded: Vec<SyntheticRecord>) -> SimResult<usize> {
        if !self.records.is_empty() || self.journal.is_some() {
            return Err(SimError::config("records can only be loaded into an empty store"));
        }
        loaded.sort_by_key(|r| r.id);
        for pair in loaded.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(SimError::config(format!("duplicate record id {}", pair[0].id)));
            }
        }
        for record in &loaded {
            if record.attributes.len() != self.schema.len() {
                return Err(SimError::config(format!(
                    "record {}: {} attributes for {} schema fields",
                    record.id,
                    record.attributes.len(),
                    self.schema.len()
                )));
            }
            if record.modified_at < record.created_at {
                return Err(SimError::config(format!(
                    "record {}: modified {} before created {}",
                    record.id, record.modified_at, record.created_at
                )));
            }
        }
        if let Some(last) = loaded.last() {
            if last.id >= self.next_id {
                return Err(SimError::config(format!(
                    "id_start {} must exceed the largest loaded id {}",
                    self.next_id, last.id
                )));
            }
        }

        self.live = loaded
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_deleted)
            .map(|(pos, _)| pos)
            .collect();
        self.records = loaded;
        Ok(self.records.len())
    }

    // ── Operations ─────────────────────────────────────────────

    /// Create `n` records stamped within the hour starting at `at`.
    ///
    /// All attribute draws happen before anything is appended, so a failed
    /// draw leaves the population untouched. The identities reserved for
    /// the batch are consumed either way.
    pub fn create_batch(
        &mut self,
        n: usize,
        at: NaiveDateTime,
        rng: &mut SimRng,
    ) -> SimResult<&[SyntheticRecord]> {
        let first_id = self.next_id;
        self.next_id = RecordId::try_from(n)
            .ok()
            .and_then(|n| first_id.checked_add(n))
            .ok_or_else(|| {
                SimError::config(format!("batch of {n} records overflows the id counter at {first_id}"))
            })?;

        let mut batch = Vec::with_capacity(n.min(PREALLOC_LIMIT));
        for offset in 0..n {
            let attributes = self
                .schema
                .iter()
                .map(|field| sample_field(field, rng))
                .collect::<SimResult<Vec<_>>>()?;
            let stamped = random_within_hour(at, rng);
            batch.push(SyntheticRecord {
                id: first_id + offset as RecordId,
                attributes,
                created_at: stamped,
                modified_at: stamped,
                is_deleted: false,
                bucket_day: at.date(),
                bucket_hour: at.hour(),
            });
        }

        let start = self.records.len();
        self.live.extend(start..start + n);
        self.records.extend(batch);
        Ok(&self.records[start..])
    }

    /// Rewrite one updatable field on a uniformly chosen live record.
    /// Returns false, changing nothing, when no live record exists.
    pub fn update_one(&mut self, at: NaiveDateTime, rng: &mut SimRng) -> SimResult<bool> {
        if self.live.is_empty() {
            return Ok(false);
        }
        let pos = self.live[rng.pick_index(self.live.len())];
        let field_idx = self.updatable[rng.pick_index(self.updatable.len())];
        let field = &self.schema[field_idx];
        let value = sample_value(&field.name, &field.kind, rng)?;
        let stamped = random_within_hour(at, rng);

        self.journal_touch(pos);
        let record = &mut self.records[pos];
        record.attributes[field_idx] = Some(value);
        record.touch(stamped, at);
        Ok(true)
    }

    /// Soft-delete a uniformly chosen live record.
    /// Returns false, changing nothing, when no live record exists.
    pub fn delete_one(&mut self, at: NaiveDateTime, rng: &mut SimRng) -> bool {
        if self.live.is_empty() {
            return false;
        }
        let slot = rng.pick_index(self.live.len());
        let stamped = random_within_hour(at, rng);
        let pos = self.live.swap_remove(slot);

        self.journal_touch(pos);
        if let Some(journal) = self.journal.as_mut() {
            journal.left_live.push(pos);
        }
        let record = &mut self.records[pos];
        record.is_deleted = true;
        record.touch(stamped, at);
        true
    }

    // ── Hour journal ───────────────────────────────────────────

    /// Start recording pre-mutation state for the current hour.
    pub fn begin_hour(&mut self) {
        self.journal = Some(HourJournal {
            records_len: self.records.len(),
            ..HourJournal::default()
        });
    }

    /// Keep everything done since `begin_hour`.
    pub fn commit_hour(&mut self) {
        self.journal = None;
    }

    /// Undo everything done since `begin_hour`. Identities already handed
    /// out stay consumed.
    pub fn rollback_hour(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        // Reverse order: the earliest capture of a record wins.
        for (pos, previous) in journal.touched.into_iter().rev() {
            if pos < journal.records_len {
                self.records[pos] = previous;
            }
        }
        self.records.truncate(journal.records_len);
        self.live.retain(|&pos| pos < journal.records_len);
        self.live
            .extend(journal.left_live.into_iter().filter(|&pos| pos < journal.records_len));
    }

    fn journal_touch(&mut self, pos: usize) {
        if let Some(journal) = self.journal.as_mut() {
            if pos < journal.records_len {
                journal.touched.push((pos, self.records[pos].clone()));
            }
        }
    }

    // ── Read access ────────────────────────────────────────────

    pub fn records(&self) -> &[SyntheticRecord] {
        &self.records
    }

    pub fn schema(&self) -> &[FieldSchema] {
        &self.schema
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.schema.iter().map(|f| f.name.as_str())
    }

    /// Records are appended in id order, so lookup is a binary search.
    pub fn get(&self, id: RecordId) -> Option<&SyntheticRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|pos| &self.records[pos])
    }

    pub fn value<'a>(&self, record: &'a SyntheticRecord, field: &str) -> Option<&'a FieldValue> {
        let idx = self.schema.iter().position(|f| f.name == field)?;
        record.attributes.get(idx)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.records.len() - self.live.len()
    }

    pub fn next_id(&self) -> RecordId {
        self.next_id
    }
}

/// A random second within the hour starting at `hour_start`.
pub fn random_within_hour(hour_start: NaiveDateTime, rng: &mut SimRng) -> NaiveDateTime {
    let minute = rng.next_u64_below(60) as i64;
    let second = rng.next_u64_below(60) as i64;
    hour_start + Duration::minutes(minute) + Duration::seconds(second)
}
