//! opsim-runner: batch job that simulates the logistics operation stream,
//! persists hourly summaries and prints per-bucket baselines.
//!
//! Usage:
//!   opsim-runner --seed 12345 --days 28 --db summaries.db --out-dir ./out
//!   OPSIM_SUMMARY_DB=summaries.db opsim-runner --config data/simulation.json
//!   opsim-runner --db summaries.db --initial-records out/previous.csv

use anyhow::{Context, Result};
use opsim_core::{
    baseline::{BaselineEngine, Baselines},
    config::SimConfig,
    engine::{RunReport, SimEngine},
    error::SimError,
    export,
    secrets::{EnvSecretProvider, SecretProvider},
    sink::StoreSink,
    summary_store::SqliteSummaryStore,
    types::OperationKind,
};
use std::env;
use std::path::Path;

const SUMMARY_DB_SECRET: &str = "OPSIM_SUMMARY_DB";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let days = parse_arg(&args, "--days", 0u32);
    let window_days = parse_arg(&args, "--window-days", 28i64);
    let config_path = string_arg(&args, "--config");
    let out_dir = string_arg(&args, "--out-dir").unwrap_or_else(|| "./out".to_string());

    // The store location is a credential in deployed setups; missing it is fatal.
    let db = match string_arg(&args, "--db") {
        Some(db) => db,
        None => EnvSecretProvider::new()
            .get_secret(SUMMARY_DB_SECRET)
            .context("no --db given and summary store secret unavailable")?,
    };

    let mut config = match &config_path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if days > 0 {
        config.num_days = days;
    }
    if let Some(initial) = string_arg(&args, "--initial-records") {
        config.initial_records = Some(initial.into());
    }

    println!("opsim-runner");
    println!("  seed:      {seed}");
    println!("  days:      {}", config.num_days);
    println!("  series:    {}", config.series_name);
    println!("  db:        {db}");
    if let Some(initial) = &config.initial_records {
        println!("  initial:   {}", initial.display());
    }
    println!("  out_dir:   {out_dir}");
    println!();

    let store = SqliteSummaryStore::open(&db).with_context(|| format!("opening {db}"))?;
    store.migrate()?;

    let run_id = format!("run-{seed}-{}", uuid::Uuid::new_v4().simple());
    let series_name = config.series_name.clone();
    let mut engine = SimEngine::build(run_id, seed, config, StoreSink::new(&store))?;
    let report = engine.run()?;
    let window_end = engine.clock.end() - chrono::Duration::hours(1);

    let out = Path::new(&out_dir);
    export::write_records_csv(&out.join("synthetic_logistics_data_with_operations.csv"), engine.records())?;
    export::write_summaries_csv(&out.join("summary_operations_per_hour.csv"), engine.summaries())?;
    print_report(&report);

    // Trailing window ending at the last simulated hour.
    let baselines = BaselineEngine::new(&store, series_name);
    match baselines.compute_trailing(window_end, window_days) {
        Ok(b) => print_baselines(&b),
        Err(e @ SimError::NoDataInWindow { .. }) => {
            log::warn!("{e}");
            println!("No data found in the trailing {window_days}-day window.");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:          {}", report.run_id);
    println!("  hours run:       {}", report.hours);
    println!("  created:         {}", report.created);
    println!("  updated:         {}", report.updated);
    println!("  deleted:         {}", report.deleted);
    println!("  skipped ops:     {}", report.updates_skipped + report.deletes_skipped);
    println!("  live records:    {}", report.live_records);
    println!("  deleted records: {}", report.deleted_records);
    println!();
}

fn print_baselines(baselines: &Baselines) {
    println!("=== BASELINES (mean ± 2σ) ===");
    for (bucket, b) in baselines {
        println!("  {bucket} ({} hours)", b.samples);
        for kind in OperationKind::ALL {
            let band = b.band(kind);
            println!(
                "    {:<10} mean {:>8.1}  σ {:>7.1}  [{:>8.1}, {:>8.1}]",
                format!("{kind:?}"),
                band.mean,
                band.stddev,
                band.lower,
                band.upper
            );
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}
