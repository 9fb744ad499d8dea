//! Weekly cost aggregates
//!
//! "Before" is the line cost reported by the ERP, "after" is the cost with
//! the resolved unit price applied.

use crate::calendar::WeekRange;
use crate::discrepancy::{percent_of, GoldReference};
use crate::types::{ResolvedLine, Warehouse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Resolved lines of one reporting week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBatch {
    /// Week covered
    pub week: WeekRange,
    /// Resolved lines
    pub lines: Vec<ResolvedLine>,
}

/// Destinations left out of totals (e.g. the central kitchen)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludedDestinations(BTreeSet<String>);

impl ExcludedDestinations {
    /// Nothing excluded
    pub fn none() -> Self {
        Self::default()
    }

    /// Exclude the given destinations
    pub fn new<I, S>(destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(destinations.into_iter().map(|d| d.as_ref().trim().to_string()).collect())
    }

    /// Excluded destinations in name order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Destination is excluded
    pub fn contains(&self, branch: &str) -> bool {
        self.0.contains(branch.trim())
    }

    fn keeps(&self, line: &ResolvedLine) -> bool {
        !self.contains(&line.line.branch)
    }
}

/// Before/after cost pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostDelta {
    /// ERP cost
    pub before: Decimal,
    /// Resolved cost
    pub after: Decimal,
}

impl CostDelta {
    /// after - before
    pub fn difference(&self) -> Decimal {
        self.after - self.before
    }

    /// difference / before * 100
    pub fn pct_change(&self) -> Option<Decimal> {
        percent_of(self.difference(), self.before)
    }

    fn add(&mut self, line: &ResolvedLine) {
        self.before += line.cost_before();
        self.after += line.cost_after();
    }

    fn merge(&mut self, other: &CostDelta) {
        self.before += other.before;
        self.after += other.after;
    }
}

/// Before/after totals for one key (branch or week)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostComparison {
    /// Branch name or week label
    pub key: String,
    /// Totals
    pub totals: CostDelta,
}

/// Per destination branch
pub fn cost_by_branch(lines: &[ResolvedLine]) -> Vec<CostComparison> {
    let mut by_branch: BTreeMap<&str, CostDelta> = BTreeMap::new();
    for line in lines {
        by_branch.entry(line.line.branch.as_str()).or_default().add(line);
    }

    by_branch
        .into_iter()
        .map(|(branch, totals)| CostComparison {
            key: branch.to_string(),
            totals,
        })
        .collect()
}

/// Per week, skipping excluded destinations
pub fn weekly_cost_comparison(
    batches: &[WeeklyBatch],
    excluded: &ExcludedDestinations,
) -> Vec<CostComparison> {
    let mut by_week: BTreeMap<String, CostDelta> = BTreeMap::new();
    for batch in batches {
        let totals = by_week.entry(batch.week.label()).or_default();
        for line in batch.lines.iter().filter(|l| excluded.keeps(l)) {
            totals.add(line);
        }
    }

    by_week
        .into_iter()
        .map(|(key, totals)| CostComparison { key, totals })
        .collect()
}

/// General vs finished-product totals for one week (or all weeks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginTotals {
    /// Week label, or `All`
    pub week: String,
    /// ALMACEN GENERAL
    pub general: CostDelta,
    /// ALMACEN PRODUCTO TERMINADO
    pub finished_product: CostDelta,
}

/// Label of the all-weeks row
pub const ALL_WEEKS: &str = "All";

/// Origin split per week, with a leading all-weeks row
pub fn origin_totals(batches: &[WeeklyBatch], excluded: &ExcludedDestinations) -> Vec<OriginTotals> {
    let mut by_week: BTreeMap<String, OriginTotals> = BTreeMap::new();

    for batch in batches {
        let label = batch.week.label();
        let row = by_week.entry(label.clone()).or_insert_with(|| OriginTotals {
            week: label,
            general: CostDelta::default(),
            finished_product: CostDelta::default(),
        });

        for line in batch.lines.iter().filter(|l| excluded.keeps(l)) {
            match line.line.source_warehouse {
                Warehouse::General => row.general.add(line),
                Warehouse::FinishedProduct => row.finished_product.add(line),
                Warehouse::Other => {}
            }
        }
    }

    let mut all = OriginTotals {
        week: ALL_WEEKS.to_string(),
        general: CostDelta::default(),
        finished_product: CostDelta::default(),
    };
    for row in by_week.values() {
        all.general.merge(&row.general);
        all.finished_product.merge(&row.finished_product);
    }

    std::iter::once(all).chain(by_week.into_values()).collect()
}

/// A line whose cost changed after reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    /// Product label
    pub product_name: String,
    /// Origin warehouse
    pub warehouse: Warehouse,
    /// Quantity
    pub quantity: Decimal,
    /// ERP cost / quantity
    pub unit_cost_before: Option<Decimal>,
    /// Resolved unit price
    pub unit_cost_after: Decimal,
    /// ERP cost
    pub cost_before: Decimal,
    /// Resolved cost
    pub cost_after: Decimal,
    /// Destination branch
    pub branch: String,
    /// Order identifier
    pub order_id: String,
}

/// Lines whose cost changed, sorted by product then warehouse
pub fn price_changes(lines: &[ResolvedLine]) -> Vec<PriceChange> {
    let mut changes: Vec<PriceChange> = lines
        .iter()
        .filter(|l| l.cost_changed())
        .map(|l| PriceChange {
            product_name: l.line.product_name.clone(),
            warehouse: l.line.source_warehouse,
            quantity: l.line.quantity,
            unit_cost_before: l.line.source_cost.checked_div(l.line.quantity),
            unit_cost_after: l.resolved.unit_price,
            cost_before: l.cost_before(),
            cost_after: l.cost_after(),
            branch: l.line.branch.clone(),
            order_id: l.line.order_id.clone(),
        })
        .collect();

    changes.sort_by(|a, b| {
        a.product_name
            .cmp(&b.product_name)
            .then_with(|| a.warehouse.cmp(&b.warehouse))
    });
    changes
}

/// Alert level for a price correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    /// Above the medium threshold
    Medium,
    /// Above the high threshold
    High,
}

impl AlertLevel {
    /// Column value
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Medium => "MEDIUM",
            AlertLevel::High => "HIGH",
        }
    }
}

/// Percentage thresholds for correction alerts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Above this: `High`
    pub high_pct: Decimal,
    /// Above this (and not high): `Medium`
    pub medium_pct: Decimal,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high_pct: Decimal::from(50),
            medium_pct: Decimal::from(25),
        }
    }
}

impl AlertThresholds {
    /// Level for a percentage change
    pub fn classify(&self, pct_change: Option<Decimal>) -> Option<AlertLevel> {
        let pct = pct_change?.abs();
        if pct > self.high_pct {
            Some(AlertLevel::High)
        } else if pct > self.medium_pct {
            Some(AlertLevel::Medium)
        } else {
            None
        }
    }
}

/// Corrected price compared with the weighted-average ERP price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeAlert {
    /// Product label
    pub product_name: String,
    /// Origin warehouse
    pub warehouse: Warehouse,
    /// Total quantity over changed lines
    pub total_quantity: Decimal,
    /// Σ cost_before / Σ quantity
    pub weighted_avg_unit_before: Option<Decimal>,
    /// Resolved unit price (first changed line)
    pub unit_after: Decimal,
    /// (unit_after - weighted_avg) / weighted_avg * 100
    pub pct_change_unit: Option<Decimal>,
    /// Totals over changed lines
    pub totals: CostDelta,
    /// Alert level, if any
    pub level: Option<AlertLevel>,
}

/// Per (product, warehouse) alerts, largest absolute change first
pub fn price_change_alerts(lines: &[ResolvedLine], thresholds: &AlertThresholds) -> Vec<PriceChangeAlert> {
    let mut groups: BTreeMap<(&str, Warehouse), PriceChangeAlert> = BTreeMap::new();

    for line in lines.iter().filter(|l| l.cost_changed()) {
        let key = (line.line.product_name.as_str(), line.line.source_warehouse);
        let alert = groups.entry(key).or_insert_with(|| PriceChangeAlert {
            product_name: line.line.product_name.clone(),
            warehouse: line.line.source_warehouse,
            total_quantity: Decimal::ZERO,
            weighted_avg_unit_before: None,
            unit_after: line.resolved.unit_price,
            pct_change_unit: None,
            totals: CostDelta::default(),
            level: None,
        });
        alert.total_quantity += line.line.quantity;
        alert.totals.add(line);
    }

    let mut alerts: Vec<PriceChangeAlert> = groups
        .into_values()
        .map(|mut alert| {
            alert.weighted_avg_unit_before = alert.totals.before.checked_div(alert.total_quantity);
            alert.pct_change_unit = alert
                .weighted_avg_unit_before
                .and_then(|avg| percent_of(alert.unit_after - avg, avg));
            alert.level = thresholds.classify(alert.pct_change_unit);
            alert
        })
        .collect();

    alerts.sort_by(|a, b| {
        let key = |alert: &PriceChangeAlert| alert.pct_change_unit.map(|p| p.abs());
        // None sorts last
        match (key(a), key(b)) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    alerts
}

/// Per-week breakdown used to reconcile against golden totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBreakdown {
    /// Week label
    pub week: String,
    /// All resolved costs
    pub total_after: Decimal,
    /// Resolved costs to excluded destinations
    pub to_excluded: Decimal,
    /// total_after - to_excluded
    pub to_branches_only: Decimal,
    /// Finished-product origin only
    pub finished_product_only: Decimal,
    /// General origin only
    pub general_only: Decimal,
    /// Golden totals, when known for this week
    pub gold: Option<GoldReference>,
}

/// Breakdown per week, in week order
pub fn weekly_breakdown(
    batches: &[WeeklyBatch],
    gold_references: &BTreeMap<String, GoldReference>,
    excluded: &ExcludedDestinations,
) -> Vec<WeeklyBreakdown> {
    let mut by_week: BTreeMap<String, WeeklyBreakdown> = BTreeMap::new();

    for batch in batches {
        let label = batch.week.label();
        let row = by_week.entry(label.clone()).or_insert_with(|| WeeklyBreakdown {
            gold: gold_references.get(&label).copied(),
            week: label,
            total_after: Decimal::ZERO,
            to_excluded: Decimal::ZERO,
            to_branches_only: Decimal::ZERO,
            finished_product_only: Decimal::ZERO,
            general_only: Decimal::ZERO,
        });

        for line in &batch.lines {
            let cost = line.cost_after();
            row.total_after += cost;
            if excluded.contains(&line.line.branch) {
                row.to_excluded += cost;
            }
            match line.line.source_warehouse {
                Warehouse::FinishedProduct => row.finished_product_only += cost,
                Warehouse::General => row.general_only += cost,
                Warehouse::Other => {}
            }
        }
        row.to_branches_only = row.total_after - row.to_excluded;
    }

    by_week.into_values().collect()
}

/// Branch × category resolved cost totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPivot {
    cells: BTreeMap<String, BTreeMap<String, Decimal>>,
}

impl CategoryPivot {
    /// Branches in name order
    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// All categories seen, in name order
    pub fn categories(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .cells
            .values()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();
        set.into_iter().collect()
    }

    /// Cell value (zero when absent)
    pub fn get(&self, branch: &str, category: &str) -> Decimal {
        self.cells
            .get(branch)
            .and_then(|row| row.get(category))
            .copied()
            .unwrap_or_default()
    }

    /// Row total
    pub fn branch_total(&self, branch: &str) -> Decimal {
        self.cells
            .get(branch)
            .map(|row| row.values().copied().sum())
            .unwrap_or_default()
    }
}

/// Category used for lines without a department
pub const UNCATEGORIZED: &str = "SIN CATEGORIA";

/// Pivot resolved costs by destination branch and category
pub fn branch_category_pivot(lines: &[ResolvedLine], excluded: &ExcludedDestinations) -> CategoryPivot {
    let mut pivot = CategoryPivot::default();
    for line in lines.iter().filter(|l| excluded.keeps(l)) {
        let category = match line.line.category.trim() {
            "" => UNCATEGORIZED,
            c => c,
        };
        *pivot
            .cells
            .entry(line.line.branch.trim().to_string())
            .or_default()
            .entry(category.to_string())
            .or_default() += line.cost_after();
    }
    pivot
}
