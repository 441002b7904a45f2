//! Configuration defaults, file loading and validation.

use opsim_core::{
    config::{FieldKind, FieldSchema, SimConfig},
    error::SimError,
    types::{Bucket, DayType, HourType},
};
use std::path::PathBuf;

fn temp_file(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("opsim-{}-{name}", std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}

fn expect_config_error(config: SimConfig) {
    match config.validate() {
        Err(SimError::Config(_)) => {}
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn defaults_are_valid_and_scaled_by_bucket() {
    let config = SimConfig::default();
    config.validate().unwrap();
    assert_eq!(config.total_hours(), 28 * 24);
    assert_eq!(config.fields.len(), 20);

    let rates = &config.rates;
    let wa = rates.for_bucket(Bucket::new(DayType::Weekday, HourType::Active));
    let wi = rates.for_bucket(Bucket::new(DayType::Weekday, HourType::Inactive));
    let ea = rates.for_bucket(Bucket::new(DayType::Weekend, HourType::Active));
    let ei = rates.for_bucket(Bucket::new(DayType::Weekend, HourType::Inactive));
    assert!(wa.creations.mean > wi.creations.mean);
    assert!(ea.creations.mean < wa.creations.mean);
    assert!(ei.creations.mean < wi.creations.mean);
}

#[test]
fn load_merges_partial_file_over_defaults() {
    let path = temp_file(
        "partial.json",
        r#"{
            "series_name": "Dock_Events",
            "num_days": 3,
            "fields": [
                { "name": "Bay", "kind": "int_range", "low": 1, "high": 40, "null_rate": 0.0 },
                { "name": "Status", "kind": "categorical", "values": ["Open", "Closed"], "null_rate": 0.2 },
                { "name": "Hazmat", "kind": "flag", "null_rate": 0.5 }
            ],
            "updatable_fields": ["Status"]
        }"#,
    );
    let config = SimConfig::load(path.to_str().unwrap()).unwrap();
    assert_eq!(config.series_name, "Dock_Events");
    assert_eq!(config.num_days, 3);
    assert_eq!(config.active_start, 6);
    assert_eq!(config.fields.len(), 3);
    assert_eq!(config.fields[0].kind, FieldKind::IntRange { low: 1, high: 40 });
    assert_eq!(config.fields[2].kind, FieldKind::Flag);
    let _ = std::fs::remove_file(path);
}

#[test]
fn load_rejects_invalid_file() {
    let path = temp_file("bad-null-rate.json", r#"{ "fields": [
        { "name": "Bay", "kind": "int_range", "low": 1, "high": 40, "null_rate": 1.5 }
    ], "updatable_fields": ["Bay"] }"#);
    assert!(SimConfig::load(path.to_str().unwrap()).is_err());
    let _ = std::fs::remove_file(path);

    assert!(SimConfig::load("/definitely/not/here.json").is_err());
}

#[test]
fn validation_catches_bad_schemas() {
    expect_config_error(SimConfig {
        fields: vec![FieldSchema::int("A", 10, 10, 0.0)],
        updatable_fields: vec!["A".into()],
        ..SimConfig::default()
    });
    expect_config_error(SimConfig {
        fields: vec![FieldSchema::categorical("C", &["x", "y"], Some(&[1.0]), 0.0)],
        updatable_fields: vec!["C".into()],
        ..SimConfig::default()
    });
    expect_config_error(SimConfig {
        fields: vec![FieldSchema::categorical("C", &["x"], Some(&[0.0]), 0.0)],
        updatable_fields: vec!["C".into()],
        ..SimConfig::default()
    });
    expect_config_error(SimConfig {
        fields: vec![FieldSchema::flag("F", -0.1)],
        updatable_fields: vec!["F".into()],
        ..SimConfig::default()
    });
    expect_config_error(SimConfig {
        fields: vec![FieldSchema::flag("F", 0.1), FieldSchema::flag("F", 0.1)],
        updatable_fields: vec!["F".into()],
        ..SimConfig::default()
    });
    expect_config_error(SimConfig {
        updatable_fields: vec!["Missing".into()],
        ..SimConfig::default()
    });
}

#[test]
fn validation_catches_bad_windows() {
    expect_config_error(SimConfig { num_days: 0, ..SimConfig::default() });
    expect_config_error(SimConfig { active_start: 23, inactive_start: 6, ..SimConfig::default() });
    expect_config_error(SimConfig { inactive_start: 25, ..SimConfig::default() });
    expect_config_error(SimConfig { series_name: "  ".into(), ..SimConfig::default() });
}

#[test]
fn shipped_sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/simulation.json");
    let config = SimConfig::load(path).unwrap();
    assert_eq!(config.series_name, "Synthetic_Logistics_Data");
    assert_eq!(config.rates, SimConfig::default().rates);
    assert_eq!(config.initial_records, None);
}

#[test]
fn relative_initial_records_resolve_next_to_the_config_file() {
    let path = temp_file("initial.json", r#"{ "initial_records": "population.csv", "id_start": 5001 }"#);
    let config = SimConfig::load(path.to_str().unwrap()).unwrap();
    assert_eq!(config.initial_records, Some(std::env::temp_dir().join("population.csv")));
    assert_eq!(config.id_start, 5001);
    let _ = std::fs::remove_file(path);
}

#[test]
fn rate_parameters_above_the_ceiling_are_rejected() {
    let mut config = SimConfig::default();
    config.rates.weekday_active.updates.mean = 2_000_000.0;
    expect_config_error(config);

    let mut config = SimConfig::default();
    config.rates.weekend_inactive.creations.stddev = 5e9;
    expect_config_error(config);
}
