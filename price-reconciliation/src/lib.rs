//! Transfer price reconciliation
//!
//! Re-prices inter-branch inventory transfers against curated per-warehouse
//! reference price tables and reconciles the result with a hand-verified
//! golden reference.
//!
//! # Architecture
//!
//! - **Explicit tables**: price tables are arguments of a run, never globals
//! - **Warehouse dispatch**: one table per warehouse, unregistered warehouses abort the batch
//! - **Per-line flags**: data-quality problems are recorded, not raised
//!
//! # Invariants
//!
//! - A line only resolves against its own warehouse's table
//! - Unmatched lines keep their source unit cost
//! - Same inputs produce the same outputs

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod aggregation;
pub mod calendar;
pub mod config;
pub mod discrepancy;
pub mod engine;
pub mod error;
pub mod gold;
pub mod investigation;
pub mod normalize;
pub mod price_table;
pub mod types;

// Re-exports
pub use config::ReconciliationConfig;
pub use discrepancy::{compare_totals, DiscrepancySummary, Scope, ScopedTotal};
pub use engine::{entry_unit_price, reconcile_batch, resolve_price, BatchOutcome, UnmatchedReport};
pub use error::{Error, Result};
pub use normalize::{normalize_product_name, ProductAliases};
pub use price_table::{PriceTable, PriceTables};
pub use types::{
    LineIssue, PriceEntry, ResolutionMethod, ResolvedLine, ResolvedPrice, TransferLine, Unit,
    UnmatchedProduct, Warehouse,
};
