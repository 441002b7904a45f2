//! Flat-file export column order and content.

use chrono::NaiveDate;
use opsim_core::{
    config::{FieldSchema, SimConfig},
    engine::SimEngine,
    error::SimError,
    export::{read_records, write_records, write_records_csv, write_summaries, SUMMARY_COLUMNS},
    field_sampler::FieldValue,
    rate_model::HourlyCounts,
    sink::NullSink,
};

fn small_engine() -> SimEngine<NullSink> {
    let mut engine = SimEngine::build("export-test".into(), 4, SimConfig::default_test(), NullSink).unwrap();
    engine
        .step_with_counts(HourlyCounts { creations: 6, updates: 3, deletions: 2 })
        .unwrap();
    engine
        .step_with_counts(HourlyCounts { creations: 1, updates: 0, deletions: 0 })
        .unwrap();
    engine
}

#[test]
fn record_export_has_stable_columns_and_final_state() {
    let engine = small_engine();
    let mut out = Vec::new();
    write_records(&mut out, engine.records()).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    let header: Vec<&str> = lines[0].split(',').collect();
    assert_eq!(header.first(), Some(&"ID"));
    assert_eq!(header[1], "DetailNumber");
    assert_eq!(&header[header.len() - 5..], &["Created", "Modified", "isDeleted", "Day", "Hour"]);
    assert_eq!(header.len(), 1 + engine.config().fields.len() + 5);

    assert_eq!(lines.len(), 1 + 7, "one row per record");
    let deleted = lines[1..].iter().filter(|l| l.split(',').nth(header.len() - 3) == Some("True")).count();
    assert_eq!(deleted, 2);
    assert!(lines[1].starts_with("2001,"));
    assert!(lines[1].ends_with(",2024-06-01,6"));
}

#[test]
fn summary_export_matches_emitted_sequence() {
    let engine = small_engine();
    let mut out = Vec::new();
    write_summaries(&mut out, engine.summaries()).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], SUMMARY_COLUMNS.join(","));
    assert_eq!(lines[1], "Synthetic_Logistics_Data,202406010600,6,3,2,Active,Weekend");
    assert_eq!(lines[2], "Synthetic_Logistics_Data,202406010700,1,0,0,Active,Weekend");
}

#[test]
fn csv_files_are_written_to_disk() {
    let engine = small_engine();
    let dir = std::env::temp_dir().join(format!("opsim-export-{}", std::process::id()));
    let path = dir.join("records.csv");
    write_records_csv(&path, engine.records()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 8);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn exported_records_read_back_unchanged() {
    let engine = small_engine();
    let mut out = Vec::new();
    write_records(&mut out, engine.records()).unwrap();

    let loaded = read_records(&out[..], &engine.config().fields).unwrap();
    assert_eq!(loaded, engine.records().records());
}

#[test]
fn engine_continues_from_an_exported_population() {
    let previous = small_engine();
    let dir = std::env::temp_dir().join(format!("opsim-initial-{}", std::process::id()));
    let path = dir.join("initial.csv");
    write_records_csv(&path, previous.records()).unwrap();

    let config = SimConfig {
        initial_records: Some(path.clone()),
        id_start: 3001,
        ..SimConfig::default_test()
    };
    let mut engine = SimEngine::build("continued".into(), 8, config, NullSink).unwrap();
    assert_eq!(engine.records().len(), 7);
    assert_eq!(engine.records().live_count(), 5);

    engine
        .step_with_counts(HourlyCounts { creations: 1, updates: 0, deletions: 5 })
        .unwrap();
    let records = engine.records();
    assert_eq!(records.len(), 8);
    assert_eq!(records.records().last().unwrap().id, 3001);
    // Five deletes against six live records: exactly one survivor.
    assert_eq!(records.live_count(), 1);

    let clashing = SimConfig {
        initial_records: Some(path),
        id_start: 2005,
        ..SimConfig::default_test()
    };
    let err = SimEngine::build("clash".into(), 8, clashing, NullSink).err().unwrap();
    assert!(matches!(err, SimError::Config(_)), "got {err:?}");
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn population_without_lifecycle_columns_loads_as_live() {
    let schema = vec![
        FieldSchema::int("Bay", 1, 40, 0.0),
        FieldSchema::categorical("Status", &["Open", "Closed, pending"], None, 0.0),
        FieldSchema::flag("Hazmat", 0.0),
    ];
    let csv = "ID,Bay,Status,Hazmat,Created,Modified\n\
               1,12.0,Open,1,2024-05-31 10:15:00,2024-05-31 11:20:05\n\
               2,,\"Closed, pending\",0.0,2024-05-31 12:00:00,2024-05-31 12:00:00\n";
    let loaded = read_records(csv.as_bytes(), &schema).unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].attributes[0], Some(FieldValue::Int(12)));
    assert_eq!(loaded[0].attributes[2], Some(FieldValue::Flag(true)));
    assert!(!loaded[0].is_deleted);
    assert_eq!(loaded[0].bucket_day, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
    assert_eq!(loaded[0].bucket_hour, 11);
    assert_eq!(loaded[1].attributes[0], None);
    assert_eq!(loaded[1].attributes[1], Some(FieldValue::Text("Closed, pending".into())));
    assert_eq!(loaded[1].attributes[2], Some(FieldValue::Flag(false)));
}

#[test]
fn malformed_population_files_are_config_errors() {
    let schema = vec![FieldSchema::int("Bay", 1, 40, 0.0)];
    let missing_column = "ID,Created,Modified\n1,2024-05-31 10:15:00,2024-05-31 10:15:00\n";
    let bad_cell = "ID,Bay,Created,Modified\n1,twelve,2024-05-31 10:15:00,2024-05-31 10:15:00\n";
    let bad_time = "ID,Bay,Created,Modified\n1,12,yesterday,2024-05-31 10:15:00\n";
    for csv in [missing_column, bad_cell, bad_time] {
        let result = read_records(csv.as_bytes(), &schema);
        assert!(matches!(result, Err(SimError::Config(_))), "{csv:?}: {result:?}");
    }
}
