//! Shared primitive types used across the entire simulation.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a synthetic record. Assigned once, never reused.
pub type RecordId = u64;

/// Sortable `YYYYMMDDHHmm` encoding of an hour start.
pub type TimestampKey = u64;

/// The canonical run identifier.
pub type RunId = String;

/// Encode a datetime as a `YYYYMMDDHHmm` sort key.
pub fn encode_timestamp(at: NaiveDateTime) -> TimestampKey {
    let year = at.year().max(0) as u64;
    year * 100_000_000
        + u64::from(at.month()) * 1_000_000
        + u64::from(at.day()) * 10_000
        + u64::from(at.hour()) * 100
        + u64::from(at.minute())
}

/// Inverse of [`encode_timestamp`]. `None` for keys that are not a real
/// calendar minute.
pub fn decode_timestamp(key: TimestampKey) -> Option<NaiveDateTime> {
    let minute = (key % 100) as u32;
    let hour = (key / 100 % 100) as u32;
    let day = (key / 10_000 % 100) as u32;
    let month = (key / 1_000_000 % 100) as u32;
    let year = i32::try_from(key / 100_000_000).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    /// Weekend iff the ISO weekday is Saturday or Sunday.
    pub fn classify(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => Self::Weekend,
            _ => Self::Weekday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekday => "Weekday",
            Self::Weekend => "Weekend",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HourType {
    Active,
    Inactive,
}

impl HourType {
    /// Active iff `active_start <= hour < inactive_start`.
    pub fn classify(hour: u32, active_start: u32, inactive_start: u32) -> Self {
        if active_start <= hour && hour < inactive_start {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for HourType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Weekday" => Ok(Self::Weekday),
            "Weekend" => Ok(Self::Weekend),
            other => Err(format!("unknown day type '{other}'")),
        }
    }
}

impl FromStr for HourType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown hour type '{other}'")),
        }
    }
}

/// A (day_type, hour_type) classification. Rates and baselines are keyed by it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket {
    pub day_type:  DayType,
    pub hour_type: HourType,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::new(DayType::Weekday, HourType::Active),
        Bucket::new(DayType::Weekday, HourType::Inactive),
        Bucket::new(DayType::Weekend, HourType::Active),
        Bucket::new(DayType::Weekend, HourType::Inactive),
    ];

    pub const fn new(day_type: DayType, hour_type: HourType) -> Self {
        Self { day_type, hour_type }
    }

    /// Classify the hour starting at `at`.
    pub fn classify(at: NaiveDateTime, active_start: u32, inactive_start: u32) -> Self {
        Self {
            day_type:  DayType::classify(at.date()),
            hour_type: HourType::classify(at.hour(), active_start, inactive_start),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.day_type, self.hour_type)
    }
}

/// The three operation kinds counted per hour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Creations,
    Updates,
    Deletions,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [Self::Creations, Self::Updates, Self::Deletions];
}

/// One aggregate tuple per simulated hour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HourlySummary {
    pub series_name:   String,
    pub timestamp_key: TimestampKey,
    pub creations:     u64,
    pub updates:       u64,
    pub deletions:     u64,
    pub hour_type:     HourType,
    pub day_type:      DayType,
}

impl HourlySummary {
    pub fn bucket(&self) -> Bucket {
        Bucket::new(self.day_type, self.hour_type)
    }

    pub fn count(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::Creations => self.creations,
            OperationKind::Updates   => self.updates,
            OperationKind::Deletions => self.deletions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn timestamp_key_matches_calendar_digits() {
        assert_eq!(encode_timestamp(at(2024, 6, 1, 6)), 202_406_010_600);
        assert_eq!(decode_timestamp(202_406_010_600), Some(at(2024, 6, 1, 6)));
        assert_eq!(decode_timestamp(202_413_010_600), None);
    }

    #[test]
    fn saturday_morning_is_weekend_active() {
        // 2024-06-01 is a Saturday.
        let bucket = Bucket::classify(at(2024, 6, 1, 6), 6, 22);
        assert_eq!(bucket, Bucket::new(DayType::Weekend, HourType::Active));
        let late = Bucket::classify(at(2024, 6, 3, 22), 6, 22);
        assert_eq!(late, Bucket::new(DayType::Weekday, HourType::Inactive));
    }
}
