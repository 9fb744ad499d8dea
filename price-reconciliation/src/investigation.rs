//! Unit-price investigation against golden unit costs
//!
//! Golden rows give a median unit cost per product and warehouse. A median
//! outside the plausible bounds, or spread over rows that disagree too much,
//! is not trusted. Trusted medians are compared with our price tables and,
//! where they differ, proposed as corrected entries.

use crate::discrepancy::percent_of;
use crate::engine::entry_unit_price;
use crate::gold::{median, unit_cost_samples, GoldLine};
use crate::normalize::normalize_product_name;
use crate::price_table::{PriceTable, PriceTables};
use crate::types::{PriceEntry, TransferLine, Unit, Warehouse};
use crate::{Error, Result};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// When golden medians are trusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestigationThresholds {
    /// Lowest plausible unit price
    pub min_reasonable: Decimal,

    /// Highest plausible unit price
    pub max_reasonable: Decimal,

    /// Largest coefficient of variation across one product's golden rows
    pub max_cv: Decimal,

    /// Golden/our price ratio, either way, above which a difference needs review
    pub review_ratio: Decimal,

    /// Differences up to this are not corrected
    pub min_difference: Decimal,
}

impl Default for InvestigationThresholds {
    fn default() -> Self {
        Self {
            min_reasonable: Decimal::new(1, 1),
            max_reasonable: Decimal::from(100_000),
            max_cv: Decimal::new(5, 1),
            review_ratio: Decimal::from(3),
            min_difference: Decimal::new(1, 2),
        }
    }
}

impl InvestigationThresholds {
    /// Price lies inside the plausible bounds
    pub fn in_bounds(&self, price: Decimal) -> bool {
        self.min_reasonable <= price && price <= self.max_reasonable
    }

    /// Check invariants
    pub fn validate(&self) -> Result<()> {
        if self.min_reasonable.is_sign_negative() || self.min_reasonable > self.max_reasonable {
            return Err(Error::Config(format!(
                "investigation bounds {}..{} are not a valid range",
                self.min_reasonable, self.max_reasonable
            )));
        }
        if self.max_cv.is_sign_negative() || self.min_difference.is_sign_negative() {
            return Err(Error::Config(
                "investigation.max_cv and investigation.min_difference must be >= 0".to_string(),
            ));
        }
        if self.review_ratio <= Decimal::ONE {
            return Err(Error::Config(format!(
                "investigation.review_ratio must be > 1, got {}",
                self.review_ratio
            )));
        }
        Ok(())
    }
}

/// Golden unit-cost statistics of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldPriceStats {
    /// Join key
    pub normalized_name: String,
    /// First golden label seen
    pub product_name: String,
    /// Origin warehouse
    pub warehouse: Warehouse,
    /// Median unit cost
    pub median: Decimal,
    /// Golden rows
    pub count: usize,
    /// Sample standard deviation, absent for a single row
    pub std_dev: Option<Decimal>,
    /// std_dev / median, absent without a deviation or with a zero median
    pub cv: Option<Decimal>,
}

impl GoldPriceStats {
    /// Median is plausible and the rows agree closely enough
    pub fn is_reasonable(&self, thresholds: &InvestigationThresholds) -> bool {
        thresholds.in_bounds(self.median) && self.cv.map_or(true, |cv| cv <= thresholds.max_cv)
    }
}

/// Per-product golden statistics for one warehouse, in name order
pub fn gold_price_stats(gold: &[GoldLine], warehouse: Warehouse) -> Vec<GoldPriceStats> {
    unit_cost_samples(gold, warehouse)
        .into_iter()
        .filter_map(|(normalized_name, (product_name, mut costs))| {
            let std_dev = sample_std_dev(&costs);
            let count = costs.len();
            let median = median(&mut costs)?;
            let cv = std_dev.and_then(|sd| {
                if median.is_zero() {
                    None
                } else {
                    sd.checked_div(median)
                }
            });
            Some(GoldPriceStats {
                normalized_name,
                product_name,
                warehouse,
                median,
                count,
                std_dev,
                cv,
            })
        })
        .collect()
}

fn sample_std_dev(values: &[Decimal]) -> Option<Decimal> {
    if values.len() < 2 {
        return None;
    }
    let n = Decimal::from(values.len());
    let mut sum = Decimal::ZERO;
    for value in values {
        sum = sum.checked_add(*value)?;
    }
    let mean = sum.checked_div(n)?;

    let mut squares = Decimal::ZERO;
    for value in values {
        let deviation = *value - mean;
        squares = squares.checked_add(deviation.checked_mul(deviation)?)?;
    }
    squares.checked_div(n - Decimal::ONE)?.sqrt()
}

/// Our price next to the golden median for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPriceComparison {
    /// Product label (ours when we have it)
    pub product_name: String,
    /// Join key
    pub normalized_name: String,
    /// Table the comparison belongs to
    pub warehouse: Warehouse,
    /// Product has an entry in our table
    pub in_table: bool,
    /// Our per-unit price; absent off-table or with an unusable presentation
    pub ours: Option<Decimal>,
    /// Golden median
    pub gold: Option<Decimal>,
    /// Golden rows behind the median
    pub gold_count: usize,
    /// Golden coefficient of variation
    pub gold_cv: Option<Decimal>,
    /// Golden median is trusted
    pub gold_reasonable: bool,
    /// Prices are too far apart to correct without review
    pub flag_review: bool,
    /// Our price should be replaced by the golden median
    pub use_gold: bool,
}

impl UnitPriceComparison {
    /// ours - gold
    pub fn difference(&self) -> Option<Decimal> {
        Some(self.ours? - self.gold?)
    }

    /// difference / gold * 100
    pub fn pct_difference(&self) -> Option<Decimal> {
        percent_of(self.difference()?, self.gold?)
    }
}

/// Outer join of one price table with golden statistics of the same warehouse, in name order
pub fn compare_unit_prices(
    table: &PriceTable,
    stats: &[GoldPriceStats],
    thresholds: &InvestigationThresholds,
) -> Vec<UnitPriceComparison> {
    let ours_by_name: BTreeMap<&str, &PriceEntry> = table.entries().collect();
    let gold_by_name: BTreeMap<&str, &GoldPriceStats> = stats
        .iter()
        .map(|s| (s.normalized_name.as_str(), s))
        .collect();
    let names: BTreeSet<&str> = ours_by_name
        .keys()
        .chain(gold_by_name.keys())
        .copied()
        .collect();

    names
        .into_iter()
        .map(|name| {
            let entry = ours_by_name.get(name).copied();
            let stats = gold_by_name.get(name).copied();

            let ours = entry.and_then(entry_unit_price);
            let gold = stats.map(|s| s.median);
            let gold_reasonable = stats.is_some_and(|s| s.is_reasonable(thresholds));
            let flag_review = match (ours, gold) {
                (Some(ours), Some(gold)) if !ours.is_zero() => {
                    gold > ours * thresholds.review_ratio || gold * thresholds.review_ratio < ours
                }
                _ => false,
            };

            let mut comparison = UnitPriceComparison {
                product_name: entry
                    .map(|e| e.product_name.clone())
                    .or_else(|| stats.map(|s| s.product_name.clone()))
                    .unwrap_or_else(|| name.to_string()),
                normalized_name: name.to_string(),
                warehouse: table.warehouse(),
                in_table: entry.is_some(),
                ours,
                gold,
                gold_count: stats.map_or(0, |s| s.count),
                gold_cv: stats.and_then(|s| s.cv),
                gold_reasonable,
                flag_review,
                use_gold: false,
            };
            comparison.use_gold = gold_reasonable
                && !flag_review
                && comparison
                    .difference()
                    .is_some_and(|d| d.abs() > thresholds.min_difference);
            comparison
        })
        .collect()
}

fn gold_entry(product_name: &str, price: Decimal) -> PriceEntry {
    PriceEntry::new(product_name, price.round_dp(2), Unit::Piece, Decimal::ONE)
}

/// Our table with trusted golden prices applied, then trusted golden-only products appended
///
/// Golden prices become one-unit piece entries rounded to cents. Every other
/// entry is kept as it was.
pub fn corrected_entries(table: &PriceTable, comparisons: &[UnitPriceComparison]) -> Vec<PriceEntry> {
    let by_name: BTreeMap<&str, &UnitPriceComparison> = comparisons
        .iter()
        .filter(|c| c.warehouse == table.warehouse())
        .map(|c| (c.normalized_name.as_str(), c))
        .collect();

    let mut entries: Vec<PriceEntry> = table
        .entries()
        .map(|(name, entry)| {
            match by_name.get(name).filter(|c| c.use_gold).and_then(|c| c.gold) {
                Some(gold) => gold_entry(&entry.product_name, gold),
                None => entry.clone(),
            }
        })
        .collect();

    entries.extend(by_name.values().filter_map(|c| match c.gold {
        Some(gold) if !c.in_table && c.gold_reasonable => Some(gold_entry(&c.product_name, gold)),
        _ => None,
    }));
    entries
}

/// Transferred product no price table knows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingProduct {
    /// Join key
    pub normalized_name: String,
    /// First label seen
    pub product_name: String,
    /// Warehouses it was transferred from
    pub warehouses: BTreeSet<Warehouse>,
    /// Median ERP unit cost
    pub median_unit_cost: Decimal,
    /// Transfer lines
    pub count: usize,
}

impl MissingProduct {
    /// Table the product belongs in: General when any line came from there
    pub fn home_warehouse(&self) -> Warehouse {
        if self.warehouses.contains(&Warehouse::General) {
            Warehouse::General
        } else {
            Warehouse::FinishedProduct
        }
    }
}

/// Products of `lines` found in none of `tables`, in name order
pub fn products_missing_from_tables(lines: &[TransferLine], tables: &[&PriceTable]) -> Vec<MissingProduct> {
    let mut missing: BTreeMap<String, (MissingProduct, Vec<Decimal>)> = BTreeMap::new();

    for line in lines {
        let name = normalize_product_name(&line.product_name);
        if tables.iter().any(|t| t.lookup(&name).is_some()) {
            continue;
        }
        let (product, costs) = missing.entry(name.clone()).or_insert_with(|| {
            (
                MissingProduct {
                    normalized_name: name,
                    product_name: line.product_name.trim().to_string(),
                    warehouses: BTreeSet::new(),
                    median_unit_cost: Decimal::ZERO,
                    count: 0,
                },
                Vec::new(),
            )
        });
        product.warehouses.insert(line.source_warehouse);
        product.count += 1;
        costs.push(line.source_unit_cost);
    }

    missing
        .into_values()
        .map(|(mut product, mut costs)| {
            product.median_unit_cost = median(&mut costs).unwrap_or_default();
            product
        })
        .collect()
}

/// Outcome of one investigation over every registered table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceInvestigation {
    /// Comparisons of every table, grouped by warehouse
    pub comparisons: Vec<UnitPriceComparison>,
    /// Transferred products no table knows
    pub missing: Vec<MissingProduct>,
    /// Corrected entries per warehouse
    pub corrected: BTreeMap<Warehouse, Vec<PriceEntry>>,
    /// Missing products priced from golden medians
    pub added_from_transfers: usize,
}

impl PriceInvestigation {
    /// Entries of `warehouse` replaced by the golden median
    pub fn updated(&self, warehouse: Warehouse) -> usize {
        self.comparisons
            .iter()
            .filter(|c| c.warehouse == warehouse && c.use_gold)
            .count()
    }

    /// Golden-only products added to `warehouse`
    pub fn added_gold_only(&self, warehouse: Warehouse) -> usize {
        self.comparisons
            .iter()
            .filter(|c| c.warehouse == warehouse && !c.in_table && c.gold_reasonable)
            .count()
    }

    /// Golden medians not trusted
    pub fn untrusted(&self) -> usize {
        self.comparisons
            .iter()
            .filter(|c| c.gold.is_some() && !c.gold_reasonable)
            .count()
    }

    /// Differences left for review
    pub fn flagged_for_review(&self) -> usize {
        self.comparisons.iter().filter(|c| c.flag_review).count()
    }
}

/// Compare every registered table with the golden rows and build corrected tables
///
/// Transferred products missing from every table are priced from a golden
/// median within bounds, preferring their own warehouse's median, and added
/// to the table of their home warehouse.
pub fn investigate_prices(
    tables: &PriceTables,
    gold: &[GoldLine],
    lines: &[TransferLine],
    thresholds: &InvestigationThresholds,
) -> Result<PriceInvestigation> {
    let mut investigation = PriceInvestigation::default();
    let mut medians: BTreeMap<Warehouse, BTreeMap<String, Decimal>> = BTreeMap::new();
    let mut registered = Vec::new();

    for warehouse in tables.warehouses() {
        let table = tables.get(warehouse)?;
        registered.push(table);

        let stats = gold_price_stats(gold, warehouse);
        let comparisons = compare_unit_prices(table, &stats, thresholds);
        investigation
            .corrected
            .insert(warehouse, corrected_entries(table, &comparisons));
        medians.insert(
            warehouse,
            stats.into_iter().map(|s| (s.normalized_name, s.median)).collect(),
        );
        investigation.comparisons.extend(comparisons);
    }

    investigation.missing = products_missing_from_tables(lines, &registered);

    for product in &investigation.missing {
        let home = product.home_warehouse();
        let other = match home {
            Warehouse::General => Warehouse::FinishedProduct,
            _ => Warehouse::General,
        };
        let price = [home, other].into_iter().find_map(|w| {
            medians
                .get(&w)
                .and_then(|m| m.get(&product.normalized_name))
                .copied()
                .filter(|p| thresholds.in_bounds(*p))
        });
        let (Some(price), Some(entries)) = (price, investigation.corrected.get_mut(&home)) else {
            debug!("No golden price for missing product {}", product.normalized_name);
            continue;
        };
        if entries
            .iter()
            .any(|e| normalize_product_name(&e.product_name) == product.normalized_name)
        {
            continue;
        }
        entries.push(gold_entry(&product.product_name, price));
        investigation.added_from_transfers += 1;
    }

    info!(
        "Price investigation: {} comparisons, {} untrusted golden prices, {} flagged for review, {} missing products ({} priced from gold)",
        investigation.comparisons.len(),
        investigation.untrusted(),
        investigation.flagged_for_review(),
        investigation.missing.len(),
        investigation.added_from_transfers
    );
    Ok(investigation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gold(product: &str, warehouse: Warehouse, unit_cost: Decimal) -> GoldLine {
        GoldLine::new("9982-1", product, "Panem - Punto Valle", warehouse, dec!(1), unit_cost)
    }

    fn finished_table() -> PriceTable {
        PriceTable::from_entries(
            Warehouse::FinishedProduct,
            vec![
                PriceEntry::new("Salsa Verde", dec!(115.50), Unit::Piece, dec!(3)),
                PriceEntry::new("Crema de Danes", dec!(47.20), Unit::Liter, dec!(0.5)),
                PriceEntry::new("Azucar", dec!(18.50), Unit::Kilogram, dec!(1)),
            ],
        )
        .unwrap()
    }

    fn finished_gold() -> Vec<GoldLine> {
        vec![
            gold("SALSA VERDE *", Warehouse::FinishedProduct, dec!(40)),
            gold("Salsa Verde", Warehouse::FinishedProduct, dec!(40)),
            gold("Salsa Verde", Warehouse::FinishedProduct, dec!(41)),
            gold("Crema de Danes", Warehouse::FinishedProduct, dec!(200)),
            gold("Azucar", Warehouse::FinishedProduct, dec!(18.505)),
            gold("Tocino", Warehouse::FinishedProduct, dec!(10)),
            gold("Tocino", Warehouse::FinishedProduct, dec!(30)),
            gold("Jamon", Warehouse::FinishedProduct, dec!(55.5)),
            gold("Palillos", Warehouse::FinishedProduct, dec!(0.05)),
            gold("Harina", Warehouse::General, dec!(20)),
        ]
    }

    fn by_name<'a>(rows: &'a [UnitPriceComparison], name: &str) -> &'a UnitPriceComparison {
        rows.iter().find(|c| c.normalized_name == name).unwrap()
    }

    #[test]
    fn test_gold_price_stats() {
        let stats = gold_price_stats(&finished_gold(), Warehouse::FinishedProduct);
        assert_eq!(stats.len(), 6);

        let salsa = stats.iter().find(|s| s.normalized_name == "salsa verde").unwrap();
        assert_eq!(salsa.product_name, "SALSA VERDE *");
        assert_eq!(salsa.median, dec!(40));
        assert_eq!(salsa.count, 3);
        assert_eq!(salsa.std_dev.unwrap().round_dp(4), dec!(0.5774));
        assert!(salsa.is_reasonable(&InvestigationThresholds::default()));

        let tocino = stats.iter().find(|s| s.normalized_name == "tocino").unwrap();
        assert_eq!(tocino.median, dec!(20));
        assert_eq!(tocino.cv.unwrap().round_dp(4), dec!(0.7071));
        assert!(!tocino.is_reasonable(&InvestigationThresholds::default()));

        let jamon = stats.iter().find(|s| s.normalized_name == "jamon").unwrap();
        assert_eq!(jamon.std_dev, None);
        assert!(jamon.is_reasonable(&InvestigationThresholds::default()));
    }

    #[test]
    fn test_compare_unit_prices_flags() {
        let thresholds = InvestigationThresholds::default();
        let stats = gold_price_stats(&finished_gold(), Warehouse::FinishedProduct);
        let rows = compare_unit_prices(&finished_table(), &stats, &thresholds);
        assert_eq!(rows.len(), 6);

        let salsa = by_name(&rows, "salsa verde");
        assert_eq!(salsa.ours, Some(dec!(38.50)));
        assert_eq!(salsa.difference(), Some(dec!(-1.50)));
        assert_eq!(salsa.pct_difference().map(|p| p.round_dp(2)), Some(dec!(-3.75)));
        assert!(salsa.use_gold);

        // 200 vs 47.20 per liter is more than three times apart
        let crema = by_name(&rows, "crema de danes");
        assert_eq!(crema.ours, Some(dec!(47.20)));
        assert!(crema.flag_review);
        assert!(!crema.use_gold);

        let azucar = by_name(&rows, "azucar");
        assert!(azucar.gold_reasonable);
        assert!(!azucar.use_gold);

        let palillos = by_name(&rows, "palillos");
        assert!(!palillos.in_table);
        assert!(!palillos.gold_reasonable);

        assert!(rows.iter().all(|c| c.normalized_name != "harina"));
    }

    #[test]
    fn test_corrected_entries() {
        let table = finished_table();
        let stats = gold_price_stats(&finished_gold(), Warehouse::FinishedProduct);
        let rows = compare_unit_prices(&table, &stats, &InvestigationThresholds::default());
        let entries = corrected_entries(&table, &rows);

        let find = |name: &str| entries.iter().find(|e| e.product_name == name).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(find("Salsa Verde").source_price, dec!(40));
        assert_eq!(find("Salsa Verde").presentation_size, dec!(1));
        assert_eq!(find("Crema de Danes").unit, Unit::Liter);
        assert_eq!(find("Crema de Danes").source_price, dec!(47.20));
        assert_eq!(find("Azucar").source_price, dec!(18.50));
        assert_eq!(find("Jamon").source_price, dec!(55.50));
        assert!(entries.iter().all(|e| e.product_name != "Tocino"));
    }

    #[test]
    fn test_investigate_prices_fills_missing_transfer_products() {
        let tables = PriceTables::new()
            .with_table(finished_table())
            .unwrap()
            .with_table(PriceTable::empty(Warehouse::General))
            .unwrap();
        let mut gold_rows = finished_gold();
        gold_rows.push(gold("Producto Nuevo", Warehouse::FinishedProduct, dec!(13)));

        let line = |product: &str, unit_cost: Decimal| {
            TransferLine::new(
                "9980-2",
                "Panem - CEDIS",
                Warehouse::General,
                product,
                dec!(1),
                Unit::Piece,
                unit_cost,
            )
        };
        let lines = vec![
            line("Producto Nuevo", dec!(12)),
            line("producto nuevo *", dec!(14)),
            line("Misterio", dec!(5)),
            line("Azucar", dec!(18)),
        ];

        let investigation =
            investigate_prices(&tables, &gold_rows, &lines, &InvestigationThresholds::default()).unwrap();

        assert_eq!(investigation.missing.len(), 2);
        assert_eq!(investigation.missing[1].normalized_name, "producto nuevo");
        assert_eq!(investigation.missing[1].median_unit_cost, dec!(13));
        assert_eq!(investigation.missing[1].count, 2);

        // Only a finished-product median exists, so it is used for the general table
        let general = &investigation.corrected[&Warehouse::General];
        assert_eq!(general.len(), 2);
        assert_eq!(general[0].product_name, "Harina");
        assert_eq!(general[1].product_name, "Producto Nuevo");
        assert_eq!(general[1].source_price, dec!(13));
        assert_eq!(investigation.added_from_transfers, 1);

        assert_eq!(investigation.updated(Warehouse::FinishedProduct), 1);
        assert_eq!(investigation.added_gold_only(Warehouse::FinishedProduct), 2);
        assert_eq!(investigation.untrusted(), 2);
        assert_eq!(investigation.flagged_for_review(), 1);
    }

    #[test]
    fn test_thresholds_validate() {
        assert!(InvestigationThresholds::default().validate().is_ok());
        let inverted = InvestigationThresholds {
            review_ratio: dec!(0.5),
            ..InvestigationThresholds::default()
        };
        assert!(matches!(inverted.validate(), Err(Error::Config(_))));
    }
}
