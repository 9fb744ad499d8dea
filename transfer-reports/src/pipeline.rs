//! Weekly reconciliation and golden comparison runs

use crate::config::Config;
use crate::loader::{load_gold, load_price_table, load_week};
use crate::writer;
use crate::Result;
use price_reconciliation::aggregation::{
    branch_category_pivot, cost_by_branch, origin_totals, price_change_alerts, price_changes,
    weekly_breakdown, weekly_cost_comparison, ExcludedDestinations, WeeklyBatch,
};
use chrono::NaiveDate;
use price_reconciliation::calendar::{build_week_ranges, WeekRange};
use price_reconciliation::gold::{
    compare_corrections as pair_corrections, compare_lines, derive_reference_prices,
    origin_diff_summary, OriginDiff,
};
use price_reconciliation::investigation::investigate_prices as investigate;
use price_reconciliation::{
    compare_totals, reconcile_batch, DiscrepancySummary, PriceTable, PriceTables,
    ResolutionMethod, ScopedTotal, Warehouse,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the JSON run summary
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// File name of the JSON price investigation summary
pub const PRICE_INVESTIGATION_FILE: &str = "price_investigation_summary.json";

/// Which weeks a run covers
#[derive(Debug, Clone, PartialEq)]
pub enum WeekSelection {
    /// `count` Monday-Sunday weeks ending with the week containing `end`
    Last {
        /// Number of weeks
        count: usize,
        /// Any day of the most recent week
        end: NaiveDate,
        /// Cut the most recent week short (golden weeks may stop on Saturday)
        last_week_end: Option<NaiveDate>,
    },
    /// Explicit ranges, in any order
    Explicit(Vec<WeekRange>),
}

impl WeekSelection {
    /// Ranges to process, most recent first
    pub fn ranges(&self) -> Result<Vec<WeekRange>> {
        match self {
            WeekSelection::Last {
                count,
                end,
                last_week_end,
            } => {
                let mut weeks = build_week_ranges(*end, *count)?;
                if let (Some(cut), Some(last)) = (last_week_end, weeks.first_mut()) {
                    *last = WeekRange::new(last.start, *cut)?;
                }
                Ok(weeks)
            }
            WeekSelection::Explicit(ranges) => {
                if ranges.is_empty() {
                    return Err(price_reconciliation::Error::InvalidInput(
                        "No week ranges given".to_string(),
                    )
                    .into());
                }
                let mut weeks = ranges.clone();
                weeks.sort_by(|a, b| b.cmp(a));
                weeks.dedup();
                Ok(weeks)
            }
        }
    }
}

/// Weekly run options
#[derive(Debug, Clone)]
pub struct WeeklyRunOptions {
    /// Weeks to process
    pub weeks: Vec<WeekRange>,
    /// Keep excluded destinations (CEDIS) in comparison totals
    pub include_excluded_destinations: bool,
}

/// One processed week
#[derive(Debug, Clone, Serialize)]
pub struct WeekSummary {
    /// Week label
    pub week: String,
    /// Lines reconciled
    pub lines: usize,
    /// ERP total
    pub total_before: Decimal,
    /// Resolved total
    pub total_after: Decimal,
    /// Distinct flagged products
    pub flagged_products: usize,
    /// Lines per resolution method
    pub method_counts: BTreeMap<ResolutionMethod, usize>,
}

/// Outcome of a weekly run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Processed weeks, most recent first
    pub weeks: Vec<WeekSummary>,
    /// Weeks without transfer data
    pub skipped_weeks: Vec<String>,
    /// Comparisons against configured golden totals
    pub discrepancies: Vec<DiscrepancySummary>,
    /// Golden totals whose coverage differs from the week's
    pub rejected_comparisons: Vec<RejectedComparison>,
    /// Files written
    pub outputs: Vec<PathBuf>,
}

/// A golden total that was not compared because its coverage differs
#[derive(Debug, Clone, Serialize)]
pub struct RejectedComparison {
    /// Our week label
    pub week: String,
    /// Golden reference label
    pub reference: String,
    /// Why the scopes differ
    pub reason: String,
}

/// One loaded price table
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    /// Warehouse the table serves
    pub warehouse: Warehouse,
    /// Source file, if any
    pub path: Option<PathBuf>,
    /// Entries loaded
    pub entries: usize,
}

/// Outcome of a golden comparison run
#[derive(Debug, Clone, Serialize)]
pub struct GoldRunSummary {
    /// Range label
    pub range: String,
    /// Our lines in range
    pub lines: usize,
    /// Golden rows in range
    pub gold_rows: usize,
    /// Our lines with a golden counterpart
    pub matched: usize,
    /// Matched-only difference per origin
    pub origin_diffs: Vec<OriginDiff>,
    /// Derived reference prices per warehouse code
    pub derived_prices: BTreeMap<String, usize>,
    /// Files written
    pub outputs: Vec<PathBuf>,
}

/// Outcome of a price investigation run
#[derive(Debug, Clone, Serialize)]
pub struct PriceInvestigationSummary {
    /// Range label
    pub range: String,
    /// Golden rows in range
    pub gold_rows: usize,
    /// Products compared across all tables
    pub comparisons: usize,
    /// Golden medians not trusted
    pub untrusted: usize,
    /// Differences left for review
    pub flagged_for_review: usize,
    /// Entries replaced by the golden median, per warehouse code
    pub updated: BTreeMap<String, usize>,
    /// Golden-only products added, per warehouse code
    pub added_gold_only: BTreeMap<String, usize>,
    /// Transferred products no table knows
    pub missing_products: usize,
    /// Missing products priced from golden medians
    pub added_from_transfers: usize,
    /// Files written
    pub outputs: Vec<PathBuf>,
}

/// Outcome of a raw vs corrected golden check
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionRunSummary {
    /// Range label, when filtered
    pub range: Option<String>,
    /// Raw golden rows read
    pub raw_rows: usize,
    /// Corrected golden rows read
    pub corrected_rows: usize,
    /// Corrected rows paired with a raw row
    pub paired: usize,
    /// Paired rows whose price the correction changed
    pub corrections_applied: usize,
    /// Paired rows whose corrected price matches our table
    pub matching_table: usize,
    /// Files written
    pub outputs: Vec<PathBuf>,
}

/// Load the finished-product table and, when present, the general table
///
/// A missing general table file registers an empty table: General lines
/// then keep their ERP cost and show up as unmatched.
pub fn load_price_tables(config: &Config) -> Result<(PriceTables, Vec<TableSummary>)> {
    let aliases = &config.reconciliation.product_aliases;
    let paths = &config.price_tables;

    let finished = load_price_table(&paths.finished_product, Warehouse::FinishedProduct, aliases)?;
    let mut summaries = vec![TableSummary {
        warehouse: Warehouse::FinishedProduct,
        path: Some(paths.finished_product.clone()),
        entries: finished.len(),
    }];

    let general = match &paths.general {
        Some(path) if path.exists() => {
            let table = load_price_table(path, Warehouse::General, aliases)?;
            summaries.push(TableSummary {
                warehouse: Warehouse::General,
                path: Some(path.clone()),
                entries: table.len(),
            });
            table
        }
        other => {
            if let Some(path) = other {
                warn!("General price table {} not found", path.display());
            }
            summaries.push(TableSummary {
                warehouse: Warehouse::General,
                path: None,
                entries: 0,
            });
            PriceTable::empty(Warehouse::General)
        }
    };

    let tables = PriceTables::new().with_table(finished)?.with_table(general)?;
    Ok((tables, summaries))
}

/// Load every configured price table, failing on duplicates
pub fn check_prices(config: &Config) -> Result<Vec<TableSummary>> {
    let (_, summaries) = load_price_tables(config)?;
    for summary in &summaries {
        info!(
            "{} price table OK: {} entries",
            summary.warehouse.code(),
            summary.entries
        );
    }
    Ok(summaries)
}

fn comparison_exclusions(config: &Config, include_excluded: bool) -> ExcludedDestinations {
    if include_excluded {
        ExcludedDestinations::none()
    } else {
        config.reconciliation.excluded_destinations.clone()
    }
}

/// Reconcile each week and write the per-week and aggregate reports
pub fn run_weekly(config: &Config, options: &WeeklyRunOptions) -> Result<RunSummary> {
    let (tables, _) = load_price_tables(config)?;
    let batch_dir = config.batch_dir();
    let output_dir = config.output_dir();
    let excluded = comparison_exclusions(config, options.include_excluded_destinations);

    let mut summary = RunSummary::default();
    let mut batches: Vec<WeeklyBatch> = Vec::with_capacity(options.weeks.len());

    for week in &options.weeks {
        let label = week.label();
        let lines = load_week(&batch_dir, week)?;
        if lines.is_empty() {
            warn!("No transfer data for week {}", label);
            summary.skipped_weeks.push(label);
            continue;
        }

        let outcome = reconcile_batch(&lines, &tables)?;

        let path = output_dir.join(format!("transfers_{}.csv", label));
        writer::write_resolved_lines(&path, &outcome.lines)?;
        summary.outputs.push(path);

        let path = output_dir.join(format!("price_changes_{}.csv", label));
        writer::write_price_changes(&path, &price_changes(&outcome.lines))?;
        summary.outputs.push(path);

        let path = output_dir.join(format!("unmatched_{}.csv", label));
        writer::write_unmatched(&path, &outcome.unmatched)?;
        summary.outputs.push(path);

        let path = output_dir.join(format!("transfers_pivot_{}.csv", label));
        writer::write_pivot(&path, &branch_category_pivot(&outcome.lines, &excluded))?;
        summary.outputs.push(path);

        summary.weeks.push(WeekSummary {
            week: label,
            lines: outcome.lines.len(),
            total_before: outcome.total_before(),
            total_after: outcome.total_after(),
            flagged_products: outcome.unmatched.len(),
            method_counts: outcome.method_counts.clone(),
        });
        batches.push(WeeklyBatch {
            week: *week,
            lines: outcome.lines,
        });
    }

    if batches.is_empty() {
        warn!("No weeks with transfer data; aggregate reports not written");
        return Ok(summary);
    }

    let all_lines: Vec<_> = batches.iter().flat_map(|b| b.lines.iter().cloned()).collect();
    let reconciliation = &config.reconciliation;

    let path = output_dir.join("price_correction_report.csv");
    writer::write_cost_comparison(&path, "Sucursal destino", &cost_by_branch(&all_lines))?;
    summary.outputs.push(path);

    let path = output_dir.join("weekly_cost_comparison.csv");
    writer::write_cost_comparison(&path, "Week", &weekly_cost_comparison(&batches, &excluded))?;
    summary.outputs.push(path);

    let path = output_dir.join("weekly_breakdown.csv");
    writer::write_weekly_breakdown(
        &path,
        &weekly_breakdown(
            &batches,
            &reconciliation.gold_references,
            &reconciliation.excluded_destinations,
        ),
    )?;
    summary.outputs.push(path);

    let path = output_dir.join("correction_summary_totals.csv");
    writer::write_origin_totals(&path, &origin_totals(&batches, &excluded))?;
    summary.outputs.push(path);

    let path = output_dir.join("correction_summary_alerts.csv");
    writer::write_alerts(&path, &price_change_alerts(&all_lines, &reconciliation.alerts))?;
    summary.outputs.push(path);

    let (discrepancies, rejected) = gold_discrepancies(config, &batches, &excluded)?;
    summary.discrepancies = discrepancies;
    summary.rejected_comparisons = rejected;
    let path = output_dir.join("gold_discrepancies.csv");
    writer::write_discrepancies(&path, &summary.discrepancies)?;
    summary.outputs.push(path);

    let path = output_dir.join(RUN_SUMMARY_FILE);
    summary.outputs.push(path.clone());
    writer::write_json(&path, &summary)?;

    info!(
        "Processed {} weeks ({} skipped), {} golden comparisons",
        summary.weeks.len(),
        summary.skipped_weeks.len(),
        summary.discrepancies.len()
    );
    Ok(summary)
}

/// Compare each week's comparable total with every golden summary figure overlapping it
///
/// A golden figure covering other dates or other destinations is rejected
/// and reported, never compared.
fn gold_discrepancies(
    config: &Config,
    batches: &[WeeklyBatch],
    excluded: &ExcludedDestinations,
) -> Result<(Vec<DiscrepancySummary>, Vec<RejectedComparison>)> {
    let reconciliation = &config.reconciliation;
    let mut discrepancies = Vec::new();
    let mut rejected = Vec::new();

    let mut references = Vec::with_capacity(reconciliation.gold_references.len());
    for (label, gold) in &reconciliation.gold_references {
        references.push((label, WeekRange::parse_label(label)?, gold));
    }

    for batch in batches {
        let ours: Decimal = batch
            .lines
            .iter()
            .filter(|l| !excluded.contains(&l.line.branch))
            .map(|l| l.cost_after())
            .sum();
        let ours = ScopedTotal::new(batch.week.scope().excluding(excluded), ours);

        for (label, range, gold) in references.iter().filter(|(_, r, _)| r.overlaps(&batch.week)) {
            let reference = gold.summary(range, &reconciliation.excluded_destinations);
            match compare_totals(&ours, &reference, reconciliation.tolerance) {
                Ok(summary) => discrepancies.push(summary),
                Err(err @ price_reconciliation::Error::ScopeMismatch { .. }) => {
                    warn!("Golden total {} not compared with week {}: {}", label, batch.week.label(), err);
                    rejected.push(RejectedComparison {
                        week: batch.week.label(),
                        reference: label.to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok((discrepancies, rejected))
}

/// Reconcile one range and match it line by line against golden detail rows
pub fn compare_gold(config: &Config, gold_path: &Path, range: &WeekRange) -> Result<GoldRunSummary> {
    let (tables, _) = load_price_tables(config)?;
    let output_dir = config.output_dir();

    let lines = load_week(&config.batch_dir(), range)?;
    if lines.is_empty() {
        warn!("No transfer data for {}", range.label());
    }
    let outcome = reconcile_batch(&lines, &tables)?;
    let gold = load_gold(gold_path, Some(range))?;

    let comparisons = compare_lines(&outcome.lines, &gold);
    let matched = comparisons.iter().filter(|c| c.matched).count();
    let origin_diffs = origin_diff_summary(&comparisons);
    for diff in &origin_diffs {
        info!(
            "{}: matched diff {} over {} lines",
            diff.warehouse.code(),
            writer::money(diff.diff_sum),
            diff.count
        );
    }

    let mut outputs = Vec::new();

    let path = output_dir.join("investigation_report.csv");
    writer::write_line_comparisons(&path, &comparisons)?;
    outputs.push(path);

    let path = output_dir.join("investigation_origin_diffs.csv");
    writer::write_origin_diffs(&path, &origin_diffs)?;
    outputs.push(path);

    let mut derived_prices = BTreeMap::new();
    for warehouse in [Warehouse::General, Warehouse::FinishedProduct] {
        let entries = derive_reference_prices(&gold, warehouse);
        derived_prices.insert(warehouse.code().to_string(), entries.len());
        if entries.is_empty() {
            continue;
        }
        let path = output_dir.join(format!("reference_prices_{}.csv", warehouse.code()));
        writer::write_price_table(&path, &entries)?;
        outputs.push(path);
    }

    Ok(GoldRunSummary {
        range: range.label(),
        lines: outcome.lines.len(),
        gold_rows: gold.len(),
        matched,
        origin_diffs,
        derived_prices,
        outputs,
    })
}

fn updated_table_file(warehouse: Warehouse) -> String {
    match warehouse {
        Warehouse::General => "AG_PRECIOS_UPDATED.csv".to_string(),
        Warehouse::FinishedProduct => "PRECIOS_UPDATED.csv".to_string(),
        other => format!("{}_PRECIOS_UPDATED.csv", other.code()),
    }
}

/// Check our price tables against golden unit costs before a weekly run
///
/// Writes the full comparison, the transferred products no table knows and
/// one corrected table per warehouse. Nothing is written over the configured
/// tables.
pub fn investigate_prices(
    config: &Config,
    gold_path: &Path,
    range: &WeekRange,
) -> Result<PriceInvestigationSummary> {
    let (tables, _) = load_price_tables(config)?;
    let output_dir = config.output_dir();

    let gold = load_gold(gold_path, Some(range))?;
    if gold.is_empty() {
        warn!("No golden rows in {}", range.label());
    }
    let lines = load_week(&config.batch_dir(), range)?;
    let investigation = investigate(&tables, &gold, &lines, &config.reconciliation.investigation)?;

    let mut outputs = Vec::new();

    let path = output_dir.join("unit_price_comparison_full.csv");
    writer::write_unit_price_comparisons(&path, &investigation.comparisons)?;
    outputs.push(path);

    if !investigation.missing.is_empty() {
        let path = output_dir.join("transfer_products_not_in_precios.csv");
        writer::write_missing_products(&path, &investigation.missing)?;
        outputs.push(path);
    }

    let mut updated = BTreeMap::new();
    let mut added_gold_only = BTreeMap::new();
    for (warehouse, entries) in &investigation.corrected {
        let path = output_dir.join(updated_table_file(*warehouse));
        writer::write_price_table(&path, entries)?;
        outputs.push(path);
        updated.insert(warehouse.code().to_string(), investigation.updated(*warehouse));
        added_gold_only.insert(
            warehouse.code().to_string(),
            investigation.added_gold_only(*warehouse),
        );
    }

    let mut summary = PriceInvestigationSummary {
        range: range.label(),
        gold_rows: gold.len(),
        comparisons: investigation.comparisons.len(),
        untrusted: investigation.untrusted(),
        flagged_for_review: investigation.flagged_for_review(),
        updated,
        added_gold_only,
        missing_products: investigation.missing.len(),
        added_from_transfers: investigation.added_from_transfers,
        outputs,
    };

    let path = output_dir.join(PRICE_INVESTIGATION_FILE);
    summary.outputs.push(path.clone());
    writer::write_json(&path, &summary)?;
    Ok(summary)
}

/// Pair corrected golden rows with the raw export and our finished-product prices
pub fn compare_corrections(
    config: &Config,
    raw_path: &Path,
    corrected_path: &Path,
    range: Option<&WeekRange>,
) -> Result<CorrectionRunSummary> {
    let (tables, _) = load_price_tables(config)?;
    let table = tables.get(Warehouse::FinishedProduct)?;

    let raw = load_gold(raw_path, range)?;
    let corrected = load_gold(corrected_path, range)?;
    let checks = pair_corrections(&raw, &corrected, table);

    let path = config.output_dir().join("pt_w_vs_pt_r_comparison.csv");
    writer::write_correction_checks(&path, &checks)?;

    Ok(CorrectionRunSummary {
        range: range.map(WeekRange::label),
        raw_rows: raw.len(),
        corrected_rows: corrected.len(),
        paired: checks.len(),
        corrections_applied: checks.iter().filter(|c| c.correction_applied()).count(),
        matching_table: checks.iter().filter(|c| c.corrected_eq_table()).count(),
        outputs: vec![path],
    })
}
