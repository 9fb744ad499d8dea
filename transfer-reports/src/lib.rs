//! Weekly transfer cost reports
//!
//! Thin adapter around [`price_reconciliation`]: loads ERP transfer exports,
//! reference price sheets and golden detail rows from CSV, runs the engine
//! week by week and writes the correction reports.
//!
//! # Layout
//!
//! - `<data_root>/b_clean/transfers/batch`: `TransfersIssued_<branch>_<start>_<end>.csv`
//! - `<data_root>/c_processed/transfers/weekly`: reports

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod writer;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{
    check_prices, compare_corrections, compare_gold, investigate_prices, run_weekly, RunSummary,
    WeekSelection, WeeklyRunOptions,
};
