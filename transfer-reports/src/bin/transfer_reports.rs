//! Weekly transfer cost reports CLI

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use price_reconciliation::calendar::WeekRange;
use serde::Serialize;
use std::path::PathBuf;
use transfer_reports::pipeline::{self, WeekSelection, WeeklyRunOptions};
use transfer_reports::Config;

#[derive(Parser)]
#[command(
    name = "transfer-reports",
    about = "Re-price inter-branch transfers and reconcile them against golden totals",
    version
)]
struct Cli {
    #[arg(long, global = true, help = "TOML configuration file")]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the last N Monday-Sunday weeks (or explicit ranges) and write the weekly reports
    Weekly(WeeklyArgs),
    /// Load every configured price table and fail on duplicate products
    CheckPrices,
    /// Match one date range line by line against a golden detail export
    CompareGold(CompareGoldArgs),
    /// Compare our unit prices with golden medians and write corrected price tables
    #[command(alias = "pre-weekly-check")]
    InvestigatePrices(CompareGoldArgs),
    /// Check corrected golden rows against the raw export and our prices
    CompareCorrections(CompareCorrectionsArgs),
}

#[derive(Args)]
struct WeeklyArgs {
    #[arg(
        long,
        default_value_t = 12,
        value_parser = clap::value_parser!(u32).range(1..=520),
        help = "Number of weeks to process"
    )]
    weeks: u32,
    #[arg(long, help = "Any day of the last week (default: today)")]
    end: Option<NaiveDate>,
    #[arg(long, help = "Last day of the most recent week when it stops early")]
    last_week_end: Option<NaiveDate>,
    #[arg(
        long = "week",
        value_name = "START_END",
        value_parser = WeekRange::parse_label,
        conflicts_with_all = ["weeks", "end", "last_week_end"],
        help = "Explicit range, e.g. 2026-02-02_2026-02-07 (repeatable)"
    )]
    week: Vec<WeekRange>,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Keep transfers to excluded destinations (CEDIS) in comparison totals"
    )]
    include_cedis_dest: bool,
}

#[derive(Args)]
struct CompareGoldArgs {
    #[arg(long, help = "Golden detail rows (CSV)")]
    gold: PathBuf,
    #[arg(long, help = "First day of the range")]
    start: NaiveDate,
    #[arg(long, help = "Last day of the range")]
    end: NaiveDate,
}

#[derive(Args)]
struct CompareCorrectionsArgs {
    #[arg(long, help = "Raw golden detail rows (CSV)")]
    raw: PathBuf,
    #[arg(long, help = "Corrected golden detail rows (CSV)")]
    corrected: PathBuf,
    #[arg(long, requires = "end", help = "First day of the range")]
    start: Option<NaiveDate>,
    #[arg(long, requires = "start", help = "Last day of the range")]
    end: Option<NaiveDate>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Weekly(args) => handle_weekly(&config, args, cli.json),
        Commands::CheckPrices => handle_check_prices(&config, cli.json),
        Commands::CompareGold(args) => handle_compare_gold(&config, args, cli.json),
        Commands::InvestigatePrices(args) => handle_investigate_prices(&config, args, cli.json),
        Commands::CompareCorrections(args) => handle_compare_corrections(&config, args, cli.json),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            config
                .apply_env_overrides()
                .context("invalid environment override")?;
            Ok(config)
        }
        None => Config::from_env().context("invalid environment configuration"),
    }
}

fn handle_weekly(config: &Config, args: WeeklyArgs, json: bool) -> Result<()> {
    let selection = if args.week.is_empty() {
        WeekSelection::Last {
            count: args.weeks as usize,
            end: args
                .end
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            last_week_end: args.last_week_end,
        }
    } else {
        WeekSelection::Explicit(args.week)
    };
    let weeks = selection.ranges().context("invalid week selection")?;
    if let Some(latest) = weeks.first() {
        tracing::info!("Processing {} weeks, latest {}", weeks.len(), latest.label());
    }

    let options = WeeklyRunOptions {
        weeks,
        include_excluded_destinations: args.include_cedis_dest,
    };
    let summary = pipeline::run_weekly(config, &options).context("weekly run failed")?;

    if json {
        return print_json(&summary);
    }

    for week in &summary.weeks {
        println!(
            "{}: {} lines, before {} after {} ({} flagged products)",
            week.week,
            week.lines,
            transfer_reports::writer::money(week.total_before),
            transfer_reports::writer::money(week.total_after),
            week.flagged_products
        );
    }
    for week in &summary.skipped_weeks {
        println!("{}: no transfer data", week);
    }
    for rejected in &summary.rejected_comparisons {
        println!(
            "{} vs golden {}: not compared ({})",
            rejected.week, rejected.reference, rejected.reason
        );
    }
    for d in &summary.discrepancies {
        let status = if d.within_tolerance { "OK" } else { "MISMATCH" };
        println!(
            "{} vs golden: ours {} reference {} diff {} [{}]",
            d.scope,
            transfer_reports::writer::money(d.ours),
            transfer_reports::writer::money(d.reference),
            transfer_reports::writer::money(d.difference),
            status
        );
    }
    println!("Wrote {} files to {}", summary.outputs.len(), config.output_dir().display());
    Ok(())
}

fn handle_check_prices(config: &Config, json: bool) -> Result<()> {
    let tables = pipeline::check_prices(config).context("price table check failed")?;

    if json {
        return print_json(&tables);
    }

    for table in &tables {
        match &table.path {
            Some(path) => println!(
                "{}: {} entries ({})",
                table.warehouse.code(),
                table.entries,
                path.display()
            ),
            None => println!("{}: no table configured", table.warehouse.code()),
        }
    }
    Ok(())
}

fn handle_compare_gold(config: &Config, args: CompareGoldArgs, json: bool) -> Result<()> {
    let range = WeekRange::new(args.start, args.end).context("invalid range")?;
    let summary =
        pipeline::compare_gold(config, &args.gold, &range).context("golden comparison failed")?;

    if json {
        return print_json(&summary);
    }

    println!(
        "{}: {} of {} lines matched ({} golden rows)",
        summary.range, summary.matched, summary.lines, summary.gold_rows
    );
    for diff in &summary.origin_diffs {
        println!(
            "  {}: diff {} over {} lines",
            diff.warehouse.code(),
            transfer_reports::writer::money(diff.diff_sum),
            diff.count
        );
    }
    for path in &summary.outputs {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn handle_investigate_prices(config: &Config, args: CompareGoldArgs, json: bool) -> Result<()> {
    let range = WeekRange::new(args.start, args.end).context("invalid range")?;
    let summary = pipeline::investigate_prices(config, &args.gold, &range)
        .context("price investigation failed")?;

    if json {
        return print_json(&summary);
    }

    println!(
        "{}: {} products compared against {} golden rows",
        summary.range, summary.comparisons, summary.gold_rows
    );
    for (code, updated) in &summary.updated {
        println!(
            "  {}: {} prices updated, {} added from gold",
            code,
            updated,
            summary.added_gold_only.get(code).copied().unwrap_or_default()
        );
    }
    println!(
        "  {} untrusted golden prices, {} differences flagged for review",
        summary.untrusted, summary.flagged_for_review
    );
    println!(
        "  {} transferred products missing from the tables ({} priced from gold)",
        summary.missing_products, summary.added_from_transfers
    );
    for path in &summary.outputs {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn handle_compare_corrections(config: &Config, args: CompareCorrectionsArgs, json: bool) -> Result<()> {
    let range = match (args.start, args.end) {
        (Some(start), Some(end)) => Some(WeekRange::new(start, end).context("invalid range")?),
        _ => None,
    };
    let summary = pipeline::compare_corrections(config, &args.raw, &args.corrected, range.as_ref())
        .context("correction check failed")?;

    if json {
        return print_json(&summary);
    }

    println!(
        "{} of {} corrected rows paired with the raw export: {} corrected, {} match our prices",
        summary.paired, summary.corrected_rows, summary.corrections_applied, summary.matching_table
    );
    for path in &summary.outputs {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
