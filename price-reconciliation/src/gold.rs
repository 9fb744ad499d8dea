//! Line-level matching against the golden reference
//!
//! Golden rows are matched to our resolved lines by the composite key
//! (order id, normalized product name).

use crate::engine::entry_unit_price;
use crate::normalize::normalize_product_name;
use crate::price_table::PriceTable;
use crate::types::{PriceEntry, ResolvedLine, Unit, Warehouse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Product labels this short are sheet noise, not products
const MIN_PRODUCT_LABEL_LEN: usize = 3;

/// Unit costs closer than this are the same price
const SAME_PRICE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// One detail row of the golden workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldLine {
    /// Order identifier
    pub order_id: String,
    /// Product label
    pub product_name: String,
    /// Destination branch
    pub branch: String,
    /// Origin warehouse
    pub source_warehouse: Warehouse,
    /// Quantity
    pub quantity: Decimal,
    /// Line cost
    pub cost: Decimal,
    /// cost / quantity
    pub unit_cost: Option<Decimal>,
}

impl GoldLine {
    /// Create a golden row; unit cost is derived from cost and quantity
    pub fn new(
        order_id: impl Into<String>,
        product_name: impl Into<String>,
        branch: impl Into<String>,
        source_warehouse: Warehouse,
        quantity: Decimal,
        cost: Decimal,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            product_name: product_name.into(),
            branch: branch.into(),
            source_warehouse,
            quantity,
            cost,
            unit_cost: cost.checked_div(quantity),
        }
    }

    fn key(&self) -> (String, String) {
        (self.order_id.trim().to_string(), normalize_product_name(&self.product_name))
    }
}

/// Our line next to its golden counterpart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineComparison {
    /// Order identifier
    pub order_id: String,
    /// Product label (ours)
    pub product_name: String,
    /// Destination branch
    pub branch: String,
    /// Origin warehouse
    pub warehouse: Warehouse,
    /// Our resolved unit price
    pub ours_unit_cost: Decimal,
    /// Our resolved line cost
    pub ours_cost: Decimal,
    /// Golden unit cost
    pub gold_unit_cost: Option<Decimal>,
    /// Golden line cost
    pub gold_cost: Option<Decimal>,
    /// A golden row was found
    pub matched: bool,
}

impl LineComparison {
    /// ours - gold unit cost
    pub fn diff_unit_cost(&self) -> Option<Decimal> {
        self.gold_unit_cost.map(|gold| self.ours_unit_cost - gold)
    }

    /// ours - gold line cost
    pub fn diff_cost(&self) -> Option<Decimal> {
        self.gold_cost.map(|gold| self.ours_cost - gold)
    }
}

/// Match our lines against golden rows
///
/// Every one of our lines yields a row; unmatched rows carry no golden figures.
/// When the golden data repeats a key the last row wins.
pub fn compare_lines(ours: &[ResolvedLine], gold: &[GoldLine]) -> Vec<LineComparison> {
    let mut lookup: HashMap<(String, String), &GoldLine> = HashMap::with_capacity(gold.len());
    for row in gold {
        let key = row.key();
        if let Some(replaced) = lookup.insert(key, row) {
            debug!(
                "Duplicate golden row for order {} product {}: using the later one",
                replaced.order_id.trim(),
                normalize_product_name(&replaced.product_name)
            );
        }
    }

    let comparisons: Vec<LineComparison> = ours
        .iter()
        .map(|line| {
            let key = (
                line.line.order_id.trim().to_string(),
                line.resolved.normalized_name.clone(),
            );
            let gold_row = lookup.get(&key);
            LineComparison {
                order_id: line.line.order_id.clone(),
                product_name: line.line.product_name.clone(),
                branch: line.line.branch.clone(),
                warehouse: line.line.source_warehouse,
                ours_unit_cost: line.resolved.unit_price,
                ours_cost: line.resolved.line_cost,
                gold_unit_cost: gold_row.and_then(|g| g.unit_cost),
                gold_cost: gold_row.map(|g| g.cost),
                matched: gold_row.is_some(),
            }
        })
        .collect();

    let matched = comparisons.iter().filter(|c| c.matched).count();
    info!(
        "Matched {} of {} lines against {} golden keys",
        matched,
        comparisons.len(),
        lookup.len()
    );
    comparisons
}

/// A corrected golden row next to the raw row it corrects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionCheck {
    /// Destination branch
    pub branch: String,
    /// Order identifier
    pub order_id: String,
    /// Product label (corrected sheet)
    pub product_name: String,
    /// Unit cost on the raw sheet
    pub raw_unit_cost: Option<Decimal>,
    /// Unit cost on the corrected sheet
    pub corrected_unit_cost: Option<Decimal>,
    /// Our price table's unit price for the product
    pub table_unit_price: Option<Decimal>,
}

impl CorrectionCheck {
    /// Corrected and raw unit costs agree
    pub fn corrected_eq_raw(&self) -> bool {
        same_price(self.corrected_unit_cost, self.raw_unit_cost)
    }

    /// Corrected unit cost agrees with our price table
    pub fn corrected_eq_table(&self) -> bool {
        same_price(self.corrected_unit_cost, self.table_unit_price)
    }

    /// The corrected sheet changed the raw price
    pub fn correction_applied(&self) -> bool {
        !self.corrected_eq_raw()
    }

    /// corrected - table unit price
    pub fn diff_table(&self) -> Option<Decimal> {
        Some(self.corrected_unit_cost? - self.table_unit_price?)
    }
}

fn same_price(a: Option<Decimal>, b: Option<Decimal>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if (a - b).abs() < SAME_PRICE_EPSILON)
}

/// Pair each corrected golden row with its raw row by (branch, order, product)
///
/// Only rows from the table's warehouse take part. Corrected rows without a
/// raw counterpart are dropped; a repeated raw key keeps its last row.
pub fn compare_corrections(
    raw: &[GoldLine],
    corrected: &[GoldLine],
    table: &PriceTable,
) -> Vec<CorrectionCheck> {
    let warehouse = table.warehouse();
    let key = |row: &GoldLine| {
        (
            row.branch.trim().to_string(),
            row.order_id.trim().to_string(),
            normalize_product_name(&row.product_name),
        )
    };

    let mut raw_by_key: HashMap<(String, String, String), &GoldLine> = HashMap::new();
    for row in raw.iter().filter(|r| r.source_warehouse == warehouse) {
        raw_by_key.insert(key(row), row);
    }

    let checks: Vec<CorrectionCheck> = corrected
        .iter()
        .filter(|r| r.source_warehouse == warehouse)
        .filter_map(|row| {
            let k = key(row);
            let raw_row = raw_by_key.get(&k)?;
            Some(CorrectionCheck {
                branch: k.0,
                order_id: k.1,
                product_name: row.product_name.clone(),
                raw_unit_cost: raw_row.unit_cost,
                corrected_unit_cost: row.unit_cost,
                table_unit_price: table.lookup(&k.2).and_then(entry_unit_price),
            })
        })
        .collect();

    info!(
        "Correction check: {} paired rows, {} corrected, {} match the {} table",
        checks.len(),
        checks.iter().filter(|c| c.correction_applied()).count(),
        checks.iter().filter(|c| c.corrected_eq_table()).count(),
        warehouse.code()
    );
    checks
}

/// Matched-only cost difference for one warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginDiff {
    /// Origin warehouse
    pub warehouse: Warehouse,
    /// Σ (ours - gold) cost
    pub diff_sum: Decimal,
    /// Matched rows
    pub count: usize,
}

/// Sum matched differences per warehouse
pub fn origin_diff_summary(comparisons: &[LineComparison]) -> Vec<OriginDiff> {
    let mut by_origin: BTreeMap<Warehouse, OriginDiff> = BTreeMap::new();
    for comparison in comparisons {
        let Some(diff) = comparison.diff_cost() else {
            continue;
        };
        let row = by_origin.entry(comparison.warehouse).or_insert(OriginDiff {
            warehouse: comparison.warehouse,
            diff_sum: Decimal::ZERO,
            count: 0,
        });
        row.diff_sum += diff;
        row.count += 1;
    }
    by_origin.into_values().collect()
}

/// Median golden unit cost per product for one warehouse
///
/// Output entries are one-unit pieces, so resolving against them yields the
/// median unchanged.
pub fn derive_reference_prices(gold: &[GoldLine], warehouse: Warehouse) -> Vec<PriceEntry> {
    unit_cost_samples(gold, warehouse)
        .into_values()
        .filter_map(|(label, mut costs)| {
            median(&mut costs).map(|price| PriceEntry::new(label, price, Unit::Piece, Decimal::ONE))
        })
        .collect()
}

/// Golden unit costs of one warehouse by normalized name, with the first label seen
pub(crate) fn unit_cost_samples(
    gold: &[GoldLine],
    warehouse: Warehouse,
) -> BTreeMap<String, (String, Vec<Decimal>)> {
    let mut samples: BTreeMap<String, (String, Vec<Decimal>)> = BTreeMap::new();

    for row in gold.iter().filter(|g| g.source_warehouse == warehouse) {
        let label = row.product_name.trim();
        if label.chars().count() < MIN_PRODUCT_LABEL_LEN {
            continue;
        }
        let Some(unit_cost) = row.unit_cost else {
            continue;
        };
        samples
            .entry(normalize_product_name(label))
            .or_insert_with(|| (label.to_string(), Vec::new()))
            .1
            .push(unit_cost);
    }

    samples
}

pub(crate) fn median(values: &mut [Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / Decimal::TWO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResolutionMethod, ResolvedPrice, TransferLine};
    use rust_decimal_macros::dec;

    fn resolved_line(order: &str, product: &str, unit_price: Decimal, quantity: Decimal) -> ResolvedLine {
        let line = TransferLine::new(
            order,
            "Panem - Punto Valle",
            Warehouse::FinishedProduct,
            product,
            quantity,
            Unit::Piece,
            unit_price,
        );
        ResolvedLine {
            resolved: ResolvedPrice {
                unit_price,
                resolution_method: ResolutionMethod::ExactUnit,
                line_cost: quantity * unit_price,
                normalized_name: normalize_product_name(product),
                issues: Vec::new(),
            },
            line,
        }
    }

    fn gold(order: &str, product: &str, warehouse: Warehouse, quantity: Decimal, cost: Decimal) -> GoldLine {
        GoldLine::new(order, product, "Panem - Punto Valle", warehouse, quantity, cost)
    }

    #[test]
    fn test_compare_lines_by_composite_key() {
        let ours = vec![
            resolved_line("9982-1", "Salsa Verde *", dec!(38.50), dec!(2)),
            resolved_line("9982-1", "Pan de Elote", dec!(10), dec!(1)),
        ];
        let gold_rows = vec![
            gold(" 9982-1 ", "SALSA VERDE", Warehouse::FinishedProduct, dec!(2), dec!(80)),
            gold("9982-2", "Pan de Elote", Warehouse::FinishedProduct, dec!(1), dec!(10)),
        ];

        let rows = compare_lines(&ours, &gold_rows);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].matched);
        assert_eq!(rows[0].gold_unit_cost, Some(dec!(40)));
        assert_eq!(rows[0].diff_unit_cost(), Some(dec!(-1.50)));
        assert_eq!(rows[0].diff_cost(), Some(dec!(-3)));
        assert!(!rows[1].matched);
        assert_eq!(rows[1].diff_cost(), None);

        let summary = origin_diff_summary(&rows);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].diff_sum, dec!(-3));
        assert_eq!(summary[0].count, 1);
    }

    #[test]
    fn test_compare_lines_repeated_golden_key_uses_last_row() {
        let ours = vec![resolved_line("9982-1", "Salsa Verde", dec!(38.50), dec!(2))];
        let gold_rows = vec![
            gold("9982-1", "SALSA VERDE *", Warehouse::FinishedProduct, dec!(2), dec!(1)),
            gold(" 9982-1", "salsa verde", Warehouse::FinishedProduct, dec!(2), dec!(80)),
        ];

        let rows = compare_lines(&ours, &gold_rows);
        assert_eq!(rows[0].gold_cost, Some(dec!(80)));
        assert_eq!(rows[0].gold_unit_cost, Some(dec!(40)));
    }

    #[test]
    fn test_compare_corrections() {
        let table = PriceTable::from_entries(
            Warehouse::FinishedProduct,
            vec![PriceEntry::new("Salsa Verde", dec!(115.50), Unit::Piece, dec!(3))],
        )
        .unwrap();
        let raw = vec![
            gold("9982-1", "Salsa Verde", Warehouse::FinishedProduct, dec!(2), dec!(90)),
            gold("9982-2", "Pan de Elote", Warehouse::FinishedProduct, dec!(1), dec!(10)),
            gold("9980-1", "Harina", Warehouse::General, dec!(1), dec!(20)),
        ];
        let corrected = vec![
            gold("9982-1", "SALSA VERDE *", Warehouse::FinishedProduct, dec!(2), dec!(77)),
            gold("9982-2", "Pan de Elote", Warehouse::FinishedProduct, dec!(1), dec!(10.0004)),
            gold("9982-3", "Pan de Elote", Warehouse::FinishedProduct, dec!(1), dec!(10)),
            gold("9980-1", "Harina", Warehouse::General, dec!(1), dec!(22)),
        ];

        let checks = compare_corrections(&raw, &corrected, &table);
        assert_eq!(checks.len(), 2);

        assert!(checks[0].correction_applied());
        assert!(checks[0].corrected_eq_table());
        assert_eq!(checks[0].diff_table(), Some(dec!(0)));

        assert!(!checks[1].correction_applied());
        assert!(!checks[1].corrected_eq_table());
        assert_eq!(checks[1].table_unit_price, None);
    }

    #[test]
    fn test_derive_reference_prices_uses_median() {
        let rows = vec![
            gold("1", "Harina *", Warehouse::General, dec!(1), dec!(10)),
            gold("2", "HARINA", Warehouse::General, dec!(1), dec!(30)),
            gold("3", "Harina", Warehouse::General, dec!(2), dec!(40)),
            gold("4", "Harina", Warehouse::General, dec!(1), dec!(1000)),
            gold("5", "Harina", Warehouse::FinishedProduct, dec!(1), dec!(5)),
            gold("6", "xx", Warehouse::General, dec!(1), dec!(5)),
            gold("7", "Azucar", Warehouse::General, dec!(0), dec!(5)),
        ];

        let entries = derive_reference_prices(&rows, Warehouse::General);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].product_name, "Harina *");
        // samples 10, 30, 20, 1000 -> median (20 + 30) / 2
        assert_eq!(entries[0].source_price, dec!(25));
        assert_eq!(entries[0].unit, Unit::Piece);
    }
}
