//! Synthetic logistics operation stream and hourly anomaly baselines.
//!
//! The engine simulates record creation, update and soft-deletion hour by
//! hour, emitting one `HourlySummary` per hour into a time-keyed store.
//! The baseline engine later reads those summaries back and derives a
//! `mean ± 2·stddev` band per (day type, hour type) bucket.

pub mod baseline;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod field_sampler;
pub mod rate_model;
pub mod record_store;
pub mod rng;
pub mod secrets;
pub mod sink;
pub mod summary_store;
pub mod types;
