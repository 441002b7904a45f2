//! Flat-file export of the final record population and the summary sequence,
//! and import of a record population in the same layout.
//!
//! Column order is stable:
//!   records:   ID, <schema fields...>, Created, Modified, isDeleted, Day, Hour
//!   summaries: TableName, TimeStamp, Creations, Updates, Deletions, HourType, DayType

use crate::{
    config::{FieldKind, FieldSchema},
    error::{SimError, SimResult},
    field_sampler::FieldValue,
    record_store::{RecordStore, SyntheticRecord},
    types::{HourlySummary, RecordId},
};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::{
    borrow::Cow,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const SUMMARY_COLUMNS: [&str; 7] = [
    "TableName", "TimeStamp", "Creations", "Updates", "Deletions", "HourType", "DayType",
];

/// One row per record, final state only.
pub fn write_records<W: Write>(out: &mut W, store: &RecordStore) -> SimResult<()> {
    let mut header = vec!["ID"];
    header.extend(store.field_names());
    header.extend(["Created", "Modified", "isDeleted", "Day", "Hour"]);
    write_row(out, header.into_iter().map(Cow::Borrowed))?;

    for record in store.records() {
        let mut cells: Vec<Cow<'_, str>> = Vec::with_capacity(header_len(store));
        cells.push(record.id.to_string().into());
        for value in &record.attributes {
            cells.push(match value {
                Some(v) => v.to_string().into(),
                None => Cow::Borrowed(""),
            });
        }
        cells.push(record.created_at.format(TIMESTAMP_FORMAT).to_string().into());
        cells.push(record.modified_at.format(TIMESTAMP_FORMAT).to_string().into());
        cells.push(Cow::Borrowed(if record.is_deleted { "True" } else { "False" }));
        cells.push(record.bucket_day.format("%Y-%m-%d").to_string().into());
        cells.push(record.bucket_hour.to_string().into());
        write_row(out, cells.into_iter())?;
    }
    Ok(())
}

pub fn write_summaries<W: Write>(out: &mut W, summaries: &[HourlySummary]) -> SimResult<()> {
    write_row(out, SUMMARY_COLUMNS.into_iter().map(Cow::Borrowed))?;
    for s in summaries {
        write_row(
            out,
            [
                Cow::Borrowed(s.series_name.as_str()),
                s.timestamp_key.to_string().into(),
                s.creations.to_string().into(),
                s.updates.to_string().into(),
                s.deletions.to_string().into(),
                Cow::Borrowed(s.hour_type.as_str()),
                Cow::Borrowed(s.day_type.as_str()),
            ]
            .into_iter(),
        )?;
    }
    Ok(())
}

pub fn write_records_csv(path: &Path, store: &RecordStore) -> SimResult<()> {
    let mut out = create(path)?;
    write_records(&mut out, store)?;
    out.flush()?;
    log::info!("exported {} records to {}", store.len(), path.display());
    Ok(())
}

pub fn write_summaries_csv(path: &Path, summaries: &[HourlySummary]) -> SimResult<()> {
    let mut out = create(path)?;
    write_summaries(&mut out, summaries)?;
    out.flush()?;
    log::info!("exported {} summaries to {}", summaries.len(), path.display());
    Ok(())
}

// ── Import ─────────────────────────────────────────────────────────

/// Read a record population written by [`write_records`].
///
/// Columns are matched by header name, so extra columns are ignored.
/// `isDeleted`, `Day` and `Hour` may be missing or empty: rows are then
/// live and bucketed by the hour of `Modified`. Empty attribute cells are
/// nulls.
pub fn read_records<R: BufRead>(input: R, schema: &[FieldSchema]) -> SimResult<Vec<SyntheticRecord>> {
    let mut lines = input.lines();
    let header = match lines.next() {
        Some(line) => split_row(&line?, 1)?,
        None => return Ok(Vec::new()),
    };
    let columns = RecordColumns::resolve(&header, schema)?;

    let mut records = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = idx + 2;
        records.push(columns.parse(&split_row(&line, row)?, schema, row)?);
    }
    Ok(records)
}

pub fn read_records_csv(path: &Path, schema: &[FieldSchema]) -> SimResult<Vec<SyntheticRecord>> {
    let records = read_records(BufReader::new(File::open(path)?), schema)?;
    log::info!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Header positions of the columns a record is built from.
struct RecordColumns {
    id:         usize,
    fields:     Vec<usize>,
    created:    usize,
    modified:   usize,
    is_deleted: Option<usize>,
    day:        Option<usize>,
    hour:       Option<usize>,
}

impl RecordColumns {
    fn resolve(header: &[String], schema: &[FieldSchema]) -> SimResult<Self> {
        let find = |name: &str| header.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| SimError::config(format!("record file has no '{name}' column")))
        };
        Ok(Self {
            id:         require("ID")?,
            fields:     schema.iter().map(|f| require(&f.name)).collect::<SimResult<_>>()?,
            created:    require("Created")?,
            modified:   require("Modified")?,
            is_deleted: find("isDeleted"),
            day:        find("Day"),
            hour:       find("Hour"),
        })
    }

    fn parse(&self, cells: &[String], schema: &[FieldSchema], row: usize) -> SimResult<SyntheticRecord> {
        let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");
        let optional = |idx: Option<usize>| idx.map(cell).filter(|c| !c.is_empty());
        let bad = |column: &str, value: &str| {
            SimError::config(format!("record file row {row}: bad {column} value '{value}'"))
        };

        let id = cell(self.id)
            .parse::<RecordId>()
            .map_err(|_| bad("ID", cell(self.id)))?;
        let attributes = schema
            .iter()
            .zip(&self.fields)
            .map(|(field, &idx)| parse_value(&field.kind, cell(idx)).ok_or_else(|| bad(&field.name, cell(idx))))
            .collect::<SimResult<Vec<_>>>()?;
        let timestamp = |idx: usize, column: &str| {
            NaiveDateTime::parse_from_str(cell(idx), TIMESTAMP_FORMAT).map_err(|_| bad(column, cell(idx)))
        };
        let created_at = timestamp(self.created, "Created")?;
        let modified_at = timestamp(self.modified, "Modified")?;

        let is_deleted = match optional(self.is_deleted) {
            Some(raw) => parse_flag(raw).ok_or_else(|| bad("isDeleted", raw))?,
            None => false,
        };
        let bucket_day = match optional(self.day) {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| bad("Day", raw))?,
            None => modified_at.date(),
        };
        let bucket_hour = match optional(self.hour) {
            Some(raw) => parse_int(raw)
                .and_then(|h| u32::try_from(h).ok())
                .filter(|h| *h < 24)
                .ok_or_else(|| bad("Hour", raw))?,
            None => modified_at.hour(),
        };

        Ok(SyntheticRecord {
            id,
            attributes,
            created_at,
            modified_at,
            is_deleted,
            bucket_day,
            bucket_hour,
        })
    }
}

/// `Some(None)` for an empty cell, `None` when the cell does not parse.
fn parse_value(kind: &FieldKind, raw: &str) -> Option<Option<FieldValue>> {
    if raw.is_empty() {
        return Some(None);
    }
    let value = match kind {
        FieldKind::IntRange { .. } => FieldValue::Int(parse_int(raw)?),
        FieldKind::FloatRange { .. } => FieldValue::Float(raw.parse().ok()?),
        FieldKind::Categorical { .. } => FieldValue::Text(raw.to_string()),
        FieldKind::Flag => FieldValue::Flag(parse_flag(raw)?),
    };
    Some(Some(value))
}

/// Integers, including the `1234.0` form a nullable integer column takes
/// in float-typed exports.
fn parse_int(raw: &str) -> Option<i64> {
    raw.parse().ok().or_else(|| {
        let f: f64 = raw.parse().ok()?;
        (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "1" | "1.0" | "True" | "true" => Some(true),
        "0" | "0.0" | "False" | "false" => Some(false),
        _ => None,
    }
}

fn split_row(line: &str, row: usize) -> SimResult<Vec<String>> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            (true, '"') => quoted = false,
            (false, '"') if cell.is_empty() => quoted = true,
            (false, ',') => cells.push(std::mem::take(&mut cell)),
            (_, c) => cell.push(c),
        }
    }
    if quoted {
        return Err(SimError::config(format!("record file row {row}: unterminated quote")));
    }
    cells.push(cell);
    Ok(cells)
}

// ── Files ──────────────────────────────────────────────────────────

fn create(path: &Path) -> SimResult<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

fn header_len(store: &RecordStore) -> usize {
    store.schema().len() + 6
}

fn write_row<'a, W: Write>(out: &mut W, cells: impl Iterator<Item = Cow<'a, str>>) -> SimResult<()> {
    let mut first = true;
    for cell in cells {
        if !first {
            out.write_all(b",")?;
        }
        first = false;
        out.write_all(escape(&cell).as_bytes())?;
    }
    out.write_all(b"\n")?;
    Ok(())
}

fn escape(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}
