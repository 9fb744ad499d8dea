//! Price resolution and batch reconciliation
//!
//! # Policy
//!
//! | entry unit      | unit price                             | method                      |
//! |-----------------|----------------------------------------|-----------------------------|
//! | LT, KG          | `source_price`                         | `ExactUnit`                 |
//! | PZ              | `source_price / presentation_size`     | `DerivedFromPresentation`   |
//! | anything else   | as PZ, flagged `UnknownUnit`           | `DerivedFromPresentation`   |
//! | PZ, size <= 0   | line's own unit cost                   | `RawFallback`               |
//! | other, size <= 0| line's own unit cost, both flags       | `RawFallback`               |
//! | no entry        | line's own unit cost                   | `Unmatched`                 |
//!
//! Line costs are never rounded here; rounding happens when reports are
//! written.

use crate::normalize::normalize_product_name;
use crate::price_table::{PriceTable, PriceTables};
use crate::types::*;
use crate::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Resolve the unit price of one line against one price table
pub fn resolve_price(line: &TransferLine, price_table: &PriceTable) -> ResolvedPrice {
    let normalized_name = normalize_product_name(&line.product_name);

    let mut issues = Vec::new();
    let (unit_price, resolution_method) = match price_table.lookup(&normalized_name) {
        None => {
            issues.push(LineIssue::UnmatchedProduct);
            (line.source_unit_cost, ResolutionMethod::Unmatched)
        }
        Some(entry) if entry.unit.is_base_unit() => (entry.source_price, ResolutionMethod::ExactUnit),
        Some(entry) => {
            if !matches!(entry.unit, Unit::Piece) {
                issues.push(LineIssue::UnknownUnit);
            }
            match per_unit_price(entry) {
                Some(price) => (price, ResolutionMethod::DerivedFromPresentation),
                None => {
                    issues.push(LineIssue::InvalidPresentation);
                    (line.source_unit_cost, ResolutionMethod::RawFallback)
                }
            }
        }
    };

    ResolvedPrice {
        unit_price,
        resolution_method,
        line_cost: line.quantity * unit_price,
        normalized_name,
        issues,
    }
}

/// Per-unit price an entry resolves to, `None` when its presentation size is unusable
pub fn entry_unit_price(entry: &PriceEntry) -> Option<Decimal> {
    if entry.unit.is_base_unit() {
        Some(entry.source_price)
    } else {
        per_unit_price(entry)
    }
}

/// Package price divided by presentation size, `None` when the size is not positive
fn per_unit_price(entry: &PriceEntry) -> Option<Decimal> {
    if entry.presentation_size <= Decimal::ZERO {
        return None;
    }
    entry.source_price.checked_div(entry.presentation_size)
}

/// Deduplicated report of unmatched and flagged lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedReport {
    products: BTreeMap<String, UnmatchedProduct>,
}

impl UnmatchedReport {
    /// Create empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a flagged line
    pub fn record(&mut self, line: &TransferLine, resolved: &ResolvedPrice) {
        if !resolved.is_flagged() {
            return;
        }

        let product = self
            .products
            .entry(resolved.normalized_name.clone())
            .or_insert_with(|| UnmatchedProduct {
                normalized_name: resolved.normalized_name.clone(),
                warehouses: BTreeSet::new(),
                occurrences: 0,
                total_quantity: Decimal::ZERO,
                issues: BTreeSet::new(),
            });

        product.warehouses.insert(line.source_warehouse);
        product.occurrences += 1;
        product.total_quantity += line.quantity;
        product.issues.extend(resolved.issues.iter().copied());
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: UnmatchedReport) {
        for (name, incoming) in other.products {
            match self.products.get_mut(&name) {
                Some(existing) => {
                    existing.warehouses.extend(incoming.warehouses);
                    existing.occurrences += incoming.occurrences;
                    existing.total_quantity += incoming.total_quantity;
                    existing.issues.extend(incoming.issues);
                }
                None => {
                    self.products.insert(name, incoming);
                }
            }
        }
    }

    /// Products in name order
    pub fn products(&self) -> impl Iterator<Item = &UnmatchedProduct> {
        self.products.values()
    }

    /// Entry for a normalized name
    pub fn get(&self, normalized_name: &str) -> Option<&UnmatchedProduct> {
        self.products.get(normalized_name)
    }

    /// Number of distinct products
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Nothing was flagged
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Total number of flagged lines
    pub fn flagged_lines(&self) -> usize {
        self.products.values().map(|p| p.occurrences).sum()
    }
}

/// Result of reconciling one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Resolved lines, in input order
    pub lines: Vec<ResolvedLine>,

    /// Unmatched / flagged products
    pub unmatched: UnmatchedReport,

    /// Line counts per resolution method
    pub method_counts: BTreeMap<ResolutionMethod, usize>,
}

impl BatchOutcome {
    /// Resolved prices in input order
    pub fn resolved_prices(&self) -> impl Iterator<Item = &ResolvedPrice> {
        self.lines.iter().map(|l| &l.resolved)
    }

    /// Sum of ERP line costs
    pub fn total_before(&self) -> Decimal {
        self.lines.iter().map(ResolvedLine::cost_before).sum()
    }

    /// Sum of resolved line costs
    pub fn total_after(&self) -> Decimal {
        self.lines.iter().map(ResolvedLine::cost_after).sum()
    }
}

/// Reconcile a batch of lines, routing each to its warehouse's table
///
/// Fails before resolving anything if some line's warehouse has no table.
pub fn reconcile_batch(lines: &[TransferLine], price_tables: &PriceTables) -> Result<BatchOutcome> {
    let mut unrouted: BTreeSet<Warehouse> = BTreeSet::new();
    for line in lines {
        if !price_tables.contains(line.source_warehouse) {
            unrouted.insert(line.source_warehouse);
        }
    }
    if let Some(&warehouse) = unrouted.iter().next() {
        return Err(crate::Error::UnregisteredWarehouse(warehouse));
    }

    let mut resolved_lines = Vec::with_capacity(lines.len());
    let mut unmatched = UnmatchedReport::new();
    let mut method_counts: BTreeMap<ResolutionMethod, usize> = BTreeMap::new();

    for line in lines {
        let table = price_tables.get(line.source_warehouse)?;
        let resolved = resolve_price(line, table);

        for issue in &resolved.issues {
            debug!(
                "Order {} product {:?}: {}",
                line.order_id,
                line.product_name,
                issue.as_str()
            );
        }

        unmatched.record(line, &resolved);
        *method_counts.entry(resolved.resolution_method).or_insert(0) += 1;
        resolved_lines.push(ResolvedLine {
            line: line.clone(),
            resolved,
        });
    }

    if !unmatched.is_empty() {
        let sample: Vec<&str> = unmatched
            .products()
            .take(20)
            .map(|p| p.normalized_name.as_str())
            .collect();
        warn!(
            "{} flagged products kept their source prices: {:?}",
            unmatched.len(),
            sample
        );
    }

    info!(
        "Reconciled {} lines ({} flagged products)",
        resolved_lines.len(),
        unmatched.len()
    );

    Ok(BatchOutcome {
        lines: resolved_lines,
        unmatched,
        method_counts,
    })
}
