use crate::{
    error::{SimError, SimResult},
    types::{Bucket, DayType, HourType, OperationKind, RecordId},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

pub const DEFAULT_SERIES_NAME: &str = "Synthetic_Logistics_Data";

/// Largest accepted mean or stddev for an hourly operation count.
pub const MAX_RATE_PARAM: f64 = 1_000_000.0;

// ── Rate table ─────────────────────────────────────────────────────

/// Normal distribution parameters for one operation count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateParams {
    pub mean:   f64,
    pub stddev: f64,
}

impl RateParams {
    pub const fn new(mean: f64, stddev: f64) -> Self {
        Self { mean, stddev }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OperationRates {
    pub creations: RateParams,
    pub updates:   RateParams,
    pub deletions: RateParams,
}

impl OperationRates {
    pub fn get(&self, kind: OperationKind) -> RateParams {
        match kind {
            OperationKind::Creations => self.creations,
            OperationKind::Updates   => self.updates,
            OperationKind::Deletions => self.deletions,
        }
    }
}

/// Per-bucket rate policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateTable {
    pub weekday_active:   OperationRates,
    pub weekday_inactive: OperationRates,
    pub weekend_active:   OperationRates,
    pub weekend_inactive: OperationRates,
}

impl RateTable {
    pub fn for_bucket(&self, bucket: Bucket) -> &OperationRates {
        match (bucket.day_type, bucket.hour_type) {
            (DayType::Weekday, HourType::Active)   => &self.weekday_active,
            (DayType::Weekday, HourType::Inactive) => &self.weekday_inactive,
            (DayType::Weekend, HourType::Active)   => &self.weekend_active,
            (DayType::Weekend, HourType::Inactive) => &self.weekend_inactive,
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        let rates = |c: (f64, f64), u: (f64, f64), d: (f64, f64)| OperationRates {
            creations: RateParams::new(c.0, c.1),
            updates:   RateParams::new(u.0, u.1),
            deletions: RateParams::new(d.0, d.1),
        };
        Self {
            weekday_active:   rates((350.0, 65.0), (80.0, 20.0), (30.0, 15.0)),
            weekday_inactive: rates((70.0, 20.0), (30.0, 5.0), (10.0, 5.0)),
            weekend_active:   rates((250.0, 45.0), (60.0, 15.0), (20.0, 10.0)),
            weekend_inactive: rates((50.0, 15.0), (20.0, 5.0), (5.0, 3.0)),
        }
    }
}

// ── Field schema ───────────────────────────────────────────────────

/// How a domain attribute's values are drawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Integer in [low, high).
    IntRange { low: i64, high: i64 },
    /// Float in [low, high).
    FloatRange { low: f64, high: f64 },
    /// One of `values`; uniform when `weights` is absent.
    Categorical {
        values: Vec<String>,
        #[serde(default)]
        weights: Option<Vec<f64>>,
    },
    /// Coin flip.
    Flag,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSchema {
    pub name:      String,
    #[serde(flatten)]
    pub kind:      FieldKind,
    pub null_rate: f64,
}

impl FieldSchema {
    pub fn int(name: &str, low: i64, high: i64, null_rate: f64) -> Self {
        Self { name: name.into(), kind: FieldKind::IntRange { low, high }, null_rate }
    }

    pub fn float(name: &str, low: f64, high: f64, null_rate: f64) -> Self {
        Self { name: name.into(), kind: FieldKind::FloatRange { low, high }, null_rate }
    }

    pub fn categorical(name: &str, values: &[&str], weights: Option<&[f64]>, null_rate: f64) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical {
                values:  values.iter().map(|v| v.to_string()).collect(),
                weights: weights.map(|w| w.to_vec()),
            },
            null_rate,
        }
    }

    pub fn flag(name: &str, null_rate: f64) -> Self {
        Self { name: name.into(), kind: FieldKind::Flag, null_rate }
    }

    fn validate(&self) -> SimResult<()> {
        let name = &self.name;
        if name.is_empty() {
            return Err(SimError::config("field with empty name"));
        }
        if !(0.0..=1.0).contains(&self.null_rate) {
            return Err(SimError::config(format!(
                "field '{name}': null_rate {} outside [0, 1]",
                self.null_rate
            )));
        }
        match &self.kind {
            FieldKind::IntRange { low, high } if low >= high => Err(SimError::config(format!(
                "field '{name}': empty integer range [{low}, {high})"
            ))),
            FieldKind::FloatRange { low, high }
                if !low.is_finite() || !high.is_finite() || low > high =>
            {
                Err(SimError::config(format!(
                    "field '{name}': invalid float range [{low}, {high})"
                )))
            }
            FieldKind::Categorical { values, weights } => {
                if values.is_empty() {
                    return Err(SimError::config(format!("field '{name}': no categories")));
                }
                if let Some(w) = weights {
                    if w.len() != values.len() {
                        return Err(SimError::config(format!(
                            "field '{name}': {} weights for {} categories",
                            w.len(),
                            values.len()
                        )));
                    }
                    if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
                        return Err(SimError::config(format!(
                            "field '{name}': weights must be finite and non-negative"
                        )));
                    }
                    if w.iter().sum::<f64>() <= 0.0 {
                        return Err(SimError::config(format!(
                            "field '{name}': weights sum to zero"
                        )));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// The logistics attribute set, in export column order.
pub fn default_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::int("DetailNumber", 1000, 9999, 0.1),
        FieldSchema::int("LoadNumber", 1000, 9999, 0.1),
        FieldSchema::int("LotNumber", 1000, 9999, 0.1),
        FieldSchema::int("ShipmentLineID", 1000, 9999, 0.1),
        FieldSchema::int("ReceiptKey", 1000, 9999, 0.1),
        FieldSchema::int("ClientID", 100, 999, 0.1),
        FieldSchema::int("WarehouseID", 10, 99, 0.1),
        FieldSchema::int("SiteID", 10, 99, 0.1),
        FieldSchema::int("ProductID", 1000, 9999, 0.1),
        FieldSchema::int("InventoryStatusID", 10, 99, 0.1),
        FieldSchema::int("StorageLocationID", 1000, 9999, 0.1),
        FieldSchema::int("AssetTypeID", 1000, 9999, 0.1),
        FieldSchema::flag("HoldFlagBool", 0.1),
        FieldSchema::int("UnitQTY", 1, 500, 0.1),
        FieldSchema::float("Weight", 0.0, 1000.0, 0.05),
        FieldSchema::float("Volume", 0.0, 10.0, 0.05),
        FieldSchema::categorical(
            "Category",
            &["Electronics", "Clothing", "Furniture", "Food"],
            Some(&[0.7, 0.1, 0.1, 0.1]),
            0.1,
        ),
        FieldSchema::categorical(
            "Supplier",
            &["SupplierA", "SupplierB", "SupplierC"],
            Some(&[0.5, 0.3, 0.2]),
            0.1,
        ),
        FieldSchema::categorical("Status", &["Pending", "Shipped", "Delivered"], None, 0.1),
        FieldSchema::categorical("Priority", &["High", "Medium", "Low"], None, 0.1),
    ]
}

pub fn default_updatable_fields() -> Vec<String> {
    ["StorageLocationID", "InventoryStatusID", "Status", "Priority"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ── Simulation config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    pub series_name:      String,
    pub start:            NaiveDateTime,
    pub num_days:         u32,
    pub active_start:     u32,
    pub inactive_start:   u32,
    /// First identity handed out by the record store.
    pub id_start:         RecordId,
    /// Existing population to start from, in the record export layout.
    /// Every id in it must be below `id_start`.
    pub initial_records:  Option<PathBuf>,
    pub rates:            RateTable,
    pub fields:           Vec<FieldSchema>,
    pub updatable_fields: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            series_name:      DEFAULT_SERIES_NAME.into(),
            start:            NaiveDate::from_ymd_opt(2024, 6, 1)
                .and_then(|d| d.and_hms_opt(6, 0, 0))
                .unwrap_or_default(),
            num_days:         28,
            active_start:     6,
            inactive_start:   22,
            id_start:         2001,
            initial_records:  None,
            rates:            RateTable::default(),
            fields:           default_fields(),
            updatable_fields: default_updatable_fields(),
        }
    }
}

impl SimConfig {
    /// Load a JSON config file and validate it.
    /// Missing keys fall back to the built-in defaults. A relative
    /// `initial_records` path is taken relative to the config file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let partial: SimConfigFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        let mut config = partial.into_config();
        if let (Some(records), Some(dir)) = (config.initial_records.as_mut(), Path::new(path).parent()) {
            if records.is_relative() {
                *records = dir.join(&*records);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Short, fast configuration for tests.
    pub fn default_test() -> Self {
        Self { num_days: 2, ..Self::default() }
    }

    pub fn total_hours(&self) -> u64 {
        u64::from(self.num_days) * 24
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reject anything the simulation could not run with.
    /// Called before the first simulated hour.
    pub fn validate(&self) -> SimResult<()> {
        if self.series_name.trim().is_empty() {
            return Err(SimError::config("series_name must not be empty"));
        }
        if self.num_days == 0 {
            return Err(SimError::config("num_days must be at least 1"));
        }
        if self.active_start > 24 || self.inactive_start > 24 {
            return Err(SimError::config(format!(
                "hour bounds must lie in 0..=24 (active_start={}, inactive_start={})",
                self.active_start, self.inactive_start
            )));
        }
        if self.active_start > self.inactive_start {
            return Err(SimError::config(format!(
                "active_start {} is after inactive_start {}",
                self.active_start, self.inactive_start
            )));
        }

        for bucket in Bucket::ALL {
            let rates = self.rates.for_bucket(bucket);
            for kind in OperationKind::ALL {
                let p = rates.get(kind);
                if !p.mean.is_finite() || !p.stddev.is_finite() || p.stddev < 0.0 {
                    return Err(SimError::config(format!(
                        "rate {bucket} {kind:?}: invalid normal({}, {})",
                        p.mean, p.stddev
                    )));
                }
                if p.mean > MAX_RATE_PARAM || p.stddev > MAX_RATE_PARAM {
                    return Err(SimError::config(format!(
                        "rate {bucket} {kind:?}: normal({}, {}) exceeds the ceiling of {MAX_RATE_PARAM}",
                        p.mean, p.stddev
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name.as_str()) {
                return Err(SimError::config(format!("duplicate field '{}'", field.name)));
            }
        }
        if self.updatable_fields.is_empty() {
            return Err(SimError::config("updatable_fields must not be empty"));
        }
        for name in &self.updatable_fields {
            if self.field(name).is_none() {
                return Err(SimError::config(format!(
                    "updatable field '{name}' is not in the field schema"
                )));
            }
        }
        Ok(())
    }
}

/// On-disk form: every key optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct SimConfigFile {
    series_name:      Option<String>,
    start:            Option<NaiveDateTime>,
    num_days:         Option<u32>,
    active_start:     Option<u32>,
    inactive_start:   Option<u32>,
    id_start:         Option<RecordId>,
    initial_records:  Option<PathBuf>,
    rates:            Option<RateTable>,
    fields:           Option<Vec<FieldSchema>>,
    updatable_fields: Option<Vec<String>>,
}

impl SimConfigFile {
    fn into_config(self) -> SimConfig {
        let d = SimConfig::default();
        SimConfig {
            series_name:      self.series_name.unwrap_or(d.series_name),
            start:            self.start.unwrap_or(d.start),
            num_days:         self.num_days.unwrap_or(d.num_days),
            active_start:     self.active_start.unwrap_or(d.active_start),
            inactive_start:   self.inactive_start.unwrap_or(d.inactive_start),
            id_start:         self.id_start.unwrap_or(d.id_start),
            initial_records:  self.initial_records.or(d.initial_records),
            rates:            self.rates.unwrap_or(d.rates),
            fields:           self.fields.unwrap_or(d.fields),
            updatable_fields: self.updatable_fields.unwrap_or(d.updatable_fields),
        }
    }
}
