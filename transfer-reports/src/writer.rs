//! CSV report writers
//!
//! Money columns are rounded to two decimals here and nowhere else. Absent
//! values (no percentage, no golden row) are written as empty cells.

use crate::Result;
use price_reconciliation::aggregation::{
    CategoryPivot, CostComparison, OriginTotals, PriceChange, PriceChangeAlert, WeeklyBreakdown,
};
use price_reconciliation::gold::{CorrectionCheck, LineComparison, OriginDiff};
use price_reconciliation::investigation::{MissingProduct, UnitPriceComparison};
use price_reconciliation::{DiscrepancySummary, PriceEntry, ResolvedLine, UnmatchedReport};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::info;

const RESOLVED_LINES_HEADER: [&str; 14] = [
    "Orden",
    "Almacén origen",
    "Sucursal destino",
    "Fecha",
    "Cantidad",
    "Departamento",
    "Producto",
    "Unidad",
    "Presentación",
    "Costo unitario",
    "Costo",
    "Costo unitario original",
    "Costo original",
    "Metodo",
];

const PRICE_CHANGES_HEADER: [&str; 9] = [
    "Producto",
    "Almacen_origen",
    "Cantidad",
    "Costo_unitario_before",
    "Costo_unitario_after",
    "Costo_before",
    "Costo_after",
    "Sucursal destino",
    "Orden",
];

const UNMATCHED_HEADER: [&str; 5] = [
    "Producto_normalizado",
    "Almacenes",
    "Ocurrencias",
    "Cantidad_total",
    "Incidencias",
];

const ORIGIN_TOTALS_HEADER: [&str; 9] = [
    "Week", "AG_Before", "AG_After", "AG_Diff", "AG_Pct", "PT_Before", "PT_After", "PT_Diff",
    "PT_Pct",
];

const ALERTS_HEADER: [&str; 10] = [
    "Producto",
    "Almacen_origen",
    "Total_Cantidad",
    "Weighted_avg_unit_before",
    "Unit_after",
    "Pct_change_unit",
    "Costo_before_sum",
    "Costo_after_sum",
    "Cost_diff",
    "Alert",
];

const BREAKDOWN_HEADER: [&str; 8] = [
    "Week",
    "Total_After",
    "To_Excluded",
    "To_Branches_Only",
    "APT_Only",
    "AG_Only",
    "Gold_Reference",
    "Gold_NUMEROS",
];

const DISCREPANCY_HEADER: [&str; 7] = [
    "Scope",
    "Ours",
    "Reference",
    "Difference",
    "Pct",
    "Within_Tolerance",
    "Tolerance",
];

const INVESTIGATION_HEADER: [&str; 11] = [
    "Orden",
    "Producto",
    "Sucursal_destino",
    "Almacen_origen",
    "Ours_UnitCost",
    "Gold_UnitCost",
    "Ours_Costo",
    "Gold_Costo",
    "Diff_UnitCost",
    "Diff_Costo",
    "Matched",
];

const ORIGIN_DIFF_HEADER: [&str; 3] = ["Almacen_origen", "Diff_Sum", "Count"];

const PRICE_TABLE_HEADER: [&str; 4] = ["NOMBRE WANSOFT", "PRECIO DRIVE", "UNIDAD", "PRESENTACION"];

const UNIT_PRICE_COMPARISON_HEADER: [&str; 11] = [
    "Producto",
    "Origin",
    "Ours_Precio",
    "Gold_Precio",
    "Diff",
    "Pct_Diff",
    "Gold_Count",
    "Gold_CV",
    "Gold_Reasonable",
    "Use_Gold",
    "Flag_Review",
];

const MISSING_PRODUCTS_HEADER: [&str; 5] = [
    "Producto",
    "Producto_normalizado",
    "Almacenes",
    "Costo_unitario_mediana",
    "Ocurrencias",
];

const CORRECTION_CHECK_HEADER: [&str; 10] = [
    "Branch",
    "Orden",
    "Producto",
    "UnitCost_PT_R",
    "UnitCost_PT_W",
    "PRECIOS_UnitCost",
    "PT_R_eq_PT_W",
    "PT_R_eq_PRECIOS",
    "Correction_Applied",
    "PT_R_diff_PRECIOS",
];

/// Two-decimal rendering
pub fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn opt_money(value: Option<Decimal>) -> String {
    value.map(money).unwrap_or_default()
}

fn create(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?)
}

fn finish(mut wtr: csv::Writer<File>, path: &Path, rows: usize) -> Result<()> {
    wtr.flush()?;
    info!("Saved {} ({} rows)", path.display(), rows);
    Ok(())
}

/// Corrected transfer lines (`transfers_<week>.csv`)
pub fn write_resolved_lines(path: &Path, lines: &[ResolvedLine]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(RESOLVED_LINES_HEADER)?;
    for l in lines {
        wtr.write_record([
            l.line.order_id.clone(),
            l.line.source_warehouse.label().to_string(),
            l.line.branch.clone(),
            l.line
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            l.line.quantity.to_string(),
            l.line.category.clone(),
            l.line.product_name.clone(),
            l.line.unit.code().to_string(),
            l.line.presentation_size.to_string(),
            money(l.resolved.unit_price),
            money(l.resolved.line_cost),
            money(l.line.source_unit_cost),
            money(l.line.source_cost),
            l.resolved.resolution_method.as_str().to_string(),
        ])?;
    }
    finish(wtr, path, lines.len())
}

/// Lines whose cost changed (`price_changes_<week>.csv`)
pub fn write_price_changes(path: &Path, changes: &[PriceChange]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(PRICE_CHANGES_HEADER)?;
    for c in changes {
        wtr.write_record([
            c.product_name.clone(),
            c.warehouse.label().to_string(),
            c.quantity.to_string(),
            opt_money(c.unit_cost_before),
            money(c.unit_cost_after),
            money(c.cost_before),
            money(c.cost_after),
            c.branch.clone(),
            c.order_id.clone(),
        ])?;
    }
    finish(wtr, path, changes.len())
}

/// Unmatched / flagged products (`unmatched_<week>.csv`)
pub fn write_unmatched(path: &Path, report: &UnmatchedReport) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(UNMATCHED_HEADER)?;
    for p in report.products() {
        let warehouses: Vec<&str> = p.warehouses.iter().map(|w| w.code()).collect();
        let issues: Vec<&str> = p.issues.iter().map(|i| i.as_str()).collect();
        wtr.write_record([
            p.normalized_name.clone(),
            warehouses.join("|"),
            p.occurrences.to_string(),
            p.total_quantity.to_string(),
            issues.join("|"),
        ])?;
    }
    finish(wtr, path, report.len())
}

/// Before/after totals keyed by branch or week
pub fn write_cost_comparison(path: &Path, key_header: &str, rows: &[CostComparison]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record([key_header, "Total_Before", "Total_After", "Difference", "Pct_Change"])?;
    for r in rows {
        wtr.write_record([
            r.key.clone(),
            money(r.totals.before),
            money(r.totals.after),
            money(r.totals.difference()),
            opt_money(r.totals.pct_change()),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// General vs finished-product totals (`correction_summary_totals.csv`)
pub fn write_origin_totals(path: &Path, rows: &[OriginTotals]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(ORIGIN_TOTALS_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.week.clone(),
            money(r.general.before),
            money(r.general.after),
            money(r.general.difference()),
            opt_money(r.general.pct_change()),
            money(r.finished_product.before),
            money(r.finished_product.after),
            money(r.finished_product.difference()),
            opt_money(r.finished_product.pct_change()),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// Correction alerts (`correction_summary_alerts.csv`)
pub fn write_alerts(path: &Path, alerts: &[PriceChangeAlert]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(ALERTS_HEADER)?;
    for a in alerts {
        wtr.write_record([
            a.product_name.clone(),
            a.warehouse.label().to_string(),
            a.total_quantity.to_string(),
            opt_money(a.weighted_avg_unit_before),
            money(a.unit_after),
            opt_money(a.pct_change_unit),
            money(a.totals.before),
            money(a.totals.after),
            money(a.totals.difference()),
            a.level.map(|l| l.as_str()).unwrap_or("").to_string(),
        ])?;
    }
    finish(wtr, path, alerts.len())
}

/// Per-week reconciliation breakdown (`weekly_breakdown.csv`)
pub fn write_weekly_breakdown(path: &Path, rows: &[WeeklyBreakdown]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(BREAKDOWN_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.week.clone(),
            money(r.total_after),
            money(r.to_excluded),
            money(r.to_branches_only),
            money(r.finished_product_only),
            money(r.general_only),
            opt_money(r.gold.map(|g| g.detail_total)),
            opt_money(r.gold.map(|g| g.summary_total)),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// Branch × category pivot with a row total
pub fn write_pivot(path: &Path, pivot: &CategoryPivot) -> Result<()> {
    let categories = pivot.categories();
    let mut wtr = create(path)?;

    let mut header = vec!["Sucursal destino"];
    header.extend(categories.iter().copied());
    header.push("Total");
    wtr.write_record(&header)?;

    let mut rows = 0;
    for branch in pivot.branches() {
        let mut record = vec![branch.to_string()];
        record.extend(categories.iter().map(|c| money(pivot.get(branch, c))));
        record.push(money(pivot.branch_total(branch)));
        wtr.write_record(&record)?;
        rows += 1;
    }
    finish(wtr, path, rows)
}

/// Totals compared against golden references (`gold_discrepancies.csv`)
pub fn write_discrepancies(path: &Path, rows: &[DiscrepancySummary]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(DISCREPANCY_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.scope.clone(),
            money(r.ours),
            money(r.reference),
            money(r.difference),
            opt_money(r.percentage),
            r.within_tolerance.to_string(),
            money(r.tolerance),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// Line-level golden comparison (`investigation_report.csv`)
pub fn write_line_comparisons(path: &Path, rows: &[LineComparison]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(INVESTIGATION_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.order_id.clone(),
            r.product_name.clone(),
            r.branch.clone(),
            r.warehouse.label().to_string(),
            money(r.ours_unit_cost),
            opt_money(r.gold_unit_cost),
            money(r.ours_cost),
            opt_money(r.gold_cost),
            opt_money(r.diff_unit_cost()),
            opt_money(r.diff_cost()),
            r.matched.to_string(),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// Matched-only difference per origin
pub fn write_origin_diffs(path: &Path, rows: &[OriginDiff]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(ORIGIN_DIFF_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.warehouse.label().to_string(),
            money(r.diff_sum),
            r.count.to_string(),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// Price table in the layout [`load_price_table`](crate::loader::load_price_table) reads back
///
/// Prices keep full precision and the unit and presentation are written as
/// they are, so reloading reproduces every entry.
pub fn write_price_table(path: &Path, entries: &[PriceEntry]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(PRICE_TABLE_HEADER)?;
    for e in entries {
        wtr.write_record([
            e.product_name.clone(),
            e.source_price.normalize().to_string(),
            e.unit.code().to_string(),
            e.presentation_size.normalize().to_string(),
        ])?;
    }
    finish(wtr, path, entries.len())
}

/// Our unit prices against golden medians (`unit_price_comparison_full.csv`)
pub fn write_unit_price_comparisons(path: &Path, rows: &[UnitPriceComparison]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(UNIT_PRICE_COMPARISON_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.product_name.clone(),
            r.warehouse.code().to_string(),
            opt_money(r.ours),
            opt_money(r.gold),
            opt_money(r.difference()),
            opt_money(r.pct_difference()),
            r.gold_count.to_string(),
            r.gold_cv.map(|cv| cv.round_dp(4).to_string()).unwrap_or_default(),
            r.gold_reasonable.to_string(),
            r.use_gold.to_string(),
            r.flag_review.to_string(),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// Transferred products no price table knows (`transfer_products_not_in_precios.csv`)
pub fn write_missing_products(path: &Path, rows: &[MissingProduct]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(MISSING_PRODUCTS_HEADER)?;
    for r in rows {
        let warehouses: Vec<&str> = r.warehouses.iter().map(|w| w.code()).collect();
        wtr.write_record([
            r.product_name.clone(),
            r.normalized_name.clone(),
            warehouses.join("|"),
            money(r.median_unit_cost),
            r.count.to_string(),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// Raw against corrected golden rows (`pt_w_vs_pt_r_comparison.csv`)
pub fn write_correction_checks(path: &Path, rows: &[CorrectionCheck]) -> Result<()> {
    let mut wtr = create(path)?;
    wtr.write_record(CORRECTION_CHECK_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.branch.clone(),
            r.order_id.clone(),
            r.product_name.clone(),
            opt_money(r.corrected_unit_cost),
            opt_money(r.raw_unit_cost),
            opt_money(r.table_unit_price),
            r.corrected_eq_raw().to_string(),
            r.corrected_eq_table().to_string(),
            r.correction_applied().to_string(),
            opt_money(r.diff_table()),
        ])?;
    }
    finish(wtr, path, rows.len())
}

/// Pretty JSON document
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    info!("Saved {}", path.display());
    Ok(())
}
