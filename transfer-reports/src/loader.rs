//! CSV loaders for transfer exports, price tables and golden detail rows
//!
//! Columns are located by header name, not position: ERP exports and the
//! hand-maintained sheets reorder and rename columns between versions.

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use price_reconciliation::calendar::WeekRange;
use price_reconciliation::gold::GoldLine;
use price_reconciliation::{PriceEntry, PriceTable, ProductAliases, TransferLine, Unit, Warehouse};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Golden sheets carry a title block above the header row
const GOLD_HEADER_SCAN_ROWS: usize = 15;

/// Product labels this short are sheet noise
const MIN_GOLD_PRODUCT_LEN: usize = 3;

/// Lowercased, accent-folded header cells
#[derive(Debug, Clone)]
struct HeaderMap {
    headers: Vec<String>,
}

impl HeaderMap {
    fn new<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            headers: cells.into_iter().map(fold_header).collect(),
        }
    }

    fn exact(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn find(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.headers.iter().position(|h| pred(h))
    }

    fn require(&self, index: Option<usize>, path: &Path, column: &'static str) -> Result<usize> {
        index.ok_or_else(|| Error::MissingColumn {
            path: path.to_path_buf(),
            column,
        })
    }
}

fn fold_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

/// Column positions shared by transfer exports and golden detail sheets
#[derive(Debug, Clone, Copy)]
struct TransferColumns {
    order: usize,
    origin: usize,
    branch: usize,
    quantity: usize,
    product: usize,
    unit_cost: Option<usize>,
    cost: Option<usize>,
    date: Option<usize>,
    category: Option<usize>,
    presentation: Option<usize>,
    unit: Option<usize>,
}

impl TransferColumns {
    fn locate(headers: &HeaderMap, path: &Path) -> Result<Self> {
        let branch = headers
            .exact("sucursal destino")
            .or_else(|| headers.find(|h| h.contains("destino") && !h.contains("almacen")));

        Ok(Self {
            order: headers.require(headers.find(|h| h.contains("orden")), path, "Orden")?,
            origin: headers.require(
                headers.find(|h| h.contains("almacen") && h.contains("origen")),
                path,
                "Almacén origen",
            )?,
            branch: headers.require(branch, path, "Sucursal destino")?,
            quantity: headers.require(headers.exact("cantidad"), path, "Cantidad")?,
            product: headers.require(headers.exact("producto"), path, "Producto")?,
            unit_cost: headers.exact("costo unitario"),
            cost: headers
                .exact("costo")
                .or_else(|| headers.find(|h| h.starts_with("costo") && h != "costo unitario")),
            date: headers.find(|h| h.contains("fecha")),
            category: headers.exact("departamento"),
            presentation: headers.find(|h| h.starts_with("presentacion")),
            unit: headers.exact("unidad"),
        })
    }
}

/// Parse a money/quantity cell; `$`, thousands separators and blanks are tolerated
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("nan") {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Parse a date cell in any of the formats the ERP has exported
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }
    None
}

/// Leading number of a presentation cell (`"3"`, `"3 PZ"`, `"1.5 LT"`)
fn parse_presentation(raw: &str) -> Option<Decimal> {
    let number: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    parse_decimal(&number)
}

fn cell(record: &csv::StringRecord, index: Option<usize>) -> &str {
    index.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn reader(path: &Path, has_headers: bool) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_path(path)?)
}

/// Load one transfer export
pub fn load_transfers(path: impl AsRef<Path>) -> Result<Vec<TransferLine>> {
    let path = path.as_ref();
    let mut rdr = reader(path, true)?;
    let headers = HeaderMap::new(rdr.headers()?.iter());
    let columns = TransferColumns::locate(&headers, path)?;

    let mut lines = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 1;

        let product = cell(&record, Some(columns.product));
        if product.is_empty() {
            debug!("{}:{}: skipping row without product", path.display(), row);
            continue;
        }

        let parse_err = |message: String| Error::Parse {
            path: path.to_path_buf(),
            row,
            message,
        };

        let raw_quantity = cell(&record, Some(columns.quantity));
        let quantity = parse_decimal(raw_quantity)
            .ok_or_else(|| parse_err(format!("invalid Cantidad {:?}", raw_quantity)))?;
        let cost = parse_decimal(cell(&record, columns.cost));
        let unit_cost = match parse_decimal(cell(&record, columns.unit_cost)) {
            Some(unit_cost) => unit_cost,
            None => cost
                .and_then(|c| c.checked_div(quantity))
                .ok_or_else(|| parse_err("no Costo unitario and no derivable Costo".to_string()))?,
        };

        let unit = match cell(&record, columns.unit) {
            "" => Unit::Piece,
            raw => Unit::parse(raw),
        };

        let mut line = TransferLine::new(
            cell(&record, Some(columns.order)),
            cell(&record, Some(columns.branch)),
            Warehouse::from_label(cell(&record, Some(columns.origin))),
            product,
            quantity,
            unit,
            unit_cost,
        )
        .with_category(cell(&record, columns.category));

        if let Some(cost) = cost {
            line.source_cost = cost;
        }
        if let Some(presentation) = parse_presentation(cell(&record, columns.presentation)) {
            line.presentation_size = presentation;
        }
        if let Some(date) = parse_date(cell(&record, columns.date)) {
            line = line.with_date(date);
        }

        lines.push(line);
    }

    debug!("Loaded {} transfer lines from {}", lines.len(), path.display());
    Ok(lines)
}

/// Export file name for one branch and week: `TransfersIssued_<branch>_<start>_<end>.csv`
fn is_week_export(file_name: &str, week: &WeekRange) -> bool {
    let suffix = format!(
        "_{}_{}.csv",
        week.start.format("%Y-%m-%d"),
        week.end.format("%Y-%m-%d")
    );
    file_name.starts_with("TransfersIssued_") && file_name.ends_with(&suffix)
}

/// Every branch export for `week` under `batch_dir` (recursive, sorted)
pub fn collect_transfer_files(batch_dir: &Path, week: &WeekRange) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !batch_dir.is_dir() {
        warn!("Batch directory {} does not exist", batch_dir.display());
        return Ok(found);
    }

    let mut pending = vec![batch_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| is_week_export(n, week))
            {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Concatenate every branch export of one week
pub fn load_week(batch_dir: &Path, week: &WeekRange) -> Result<Vec<TransferLine>> {
    let files = collect_transfer_files(batch_dir, week)?;
    let mut lines = Vec::new();
    for file in &files {
        lines.extend(load_transfers(file)?);
    }
    info!(
        "Week {}: {} lines from {} files",
        week.label(),
        lines.len(),
        files.len()
    );
    Ok(lines)
}

/// Load a reference price table
///
/// - `NOMBRE WANSOFT` (or `Producto`) names the product.
/// - With both `PRECIO DRIVE` and `UNIDAD`, the drive price is read through
///   the unit and `PRESENTACION`. A row without a drive price falls back to
///   `PRECIO UNITARIO` when that column exists.
/// - Otherwise `PRECIO UNITARIO` (or a bare `PRECIO DRIVE`) is a per-unit
///   price.
///
/// A blank presentation counts as 1. A presentation with no leading number
/// is kept as 0 so resolution flags it instead of guessing.
///
/// Rows with no usable price are skipped; duplicate names fail the load.
pub fn load_price_table(
    path: impl AsRef<Path>,
    warehouse: Warehouse,
    aliases: &ProductAliases,
) -> Result<PriceTable> {
    let path = path.as_ref();
    let mut rdr = reader(path, true)?;
    let headers = HeaderMap::new(rdr.headers()?.iter());

    let product_col = headers.require(
        headers.exact("nombre wansoft").or_else(|| headers.exact("producto")),
        path,
        "NOMBRE WANSOFT",
    )?;
    let unit_price_col = headers.exact("precio unitario");
    let drive_col = headers.exact("precio drive");
    if unit_price_col.is_none() && drive_col.is_none() {
        return Err(Error::MissingColumn {
            path: path.to_path_buf(),
            column: "PRECIO DRIVE",
        });
    }
    let unit_col = headers.exact("unidad");
    let presentation_col = headers.find(|h| h.contains("present"));
    let drive_with_units = drive_col.is_some() && unit_col.is_some();

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for record in rdr.records() {
        let record = record?;
        let product = cell(&record, Some(product_col));
        if product.is_empty() {
            continue;
        }

        let per_unit = |col: Option<usize>| {
            parse_decimal(cell(&record, col))
                .map(|price| PriceEntry::new(product, price, Unit::Piece, Decimal::ONE))
        };

        let entry = if drive_with_units {
            match parse_decimal(cell(&record, drive_col)) {
                Some(price) => {
                    let unit = match cell(&record, unit_col) {
                        "" => Unit::Piece,
                        raw => Unit::parse(raw),
                    };
                    let raw_presentation = cell(&record, presentation_col);
                    let presentation = match raw_presentation {
                        "" => Decimal::ONE,
                        raw => parse_presentation(raw).unwrap_or_else(|| {
                            warn!(
                                "{}: unreadable presentation {:?} for {:?}",
                                path.display(),
                                raw,
                                product
                            );
                            Decimal::ZERO
                        }),
                    };
                    Some(PriceEntry::new(product, price, unit, presentation))
                }
                None => per_unit(unit_price_col),
            }
        } else {
            per_unit(unit_price_col.or(drive_col))
        };

        match entry {
            Some(entry) => entries.push(entry),
            None => {
                skipped += 1;
                debug!("{}: no usable price for {:?}", path.display(), product);
            }
        }
    }

    if skipped > 0 {
        warn!(
            "{}: skipped {} rows without a price",
            path.display(),
            skipped
        );
    }

    let table = PriceTable::from_entries(warehouse, entries)?.with_aliases(aliases.clone());
    info!(
        "Loaded {} prices for {} from {}",
        table.len(),
        warehouse.code(),
        path.display()
    );
    Ok(table)
}

/// Load golden detail rows, optionally keeping only dates inside `range`
///
/// The header row is the first of the leading rows with an `Orden` cell.
/// Rows without a product label, quantity or cost are dropped, as are rows
/// with no parseable date when a range is given.
pub fn load_gold(path: impl AsRef<Path>, range: Option<&WeekRange>) -> Result<Vec<GoldLine>> {
    let path = path.as_ref();
    let mut rdr = reader(path, false)?;
    let mut records = rdr.records();

    let mut header = None;
    for record in records.by_ref().take(GOLD_HEADER_SCAN_ROWS) {
        let record = record?;
        if record.iter().any(|c| c.contains("Orden")) {
            header = Some(record);
            break;
        }
    }
    let header = header.ok_or_else(|| Error::MissingColumn {
        path: path.to_path_buf(),
        column: "Orden",
    })?;
    let headers = HeaderMap::new(header.iter());
    let columns = TransferColumns::locate(&headers, path)?;
    let cost_col = headers.require(columns.cost, path, "Costo")?;

    let mut gold = Vec::new();
    let mut out_of_range = 0usize;
    for record in records {
        let record = record?;

        let product = cell(&record, Some(columns.product));
        if product.chars().count() < MIN_GOLD_PRODUCT_LEN {
            continue;
        }
        let (Some(quantity), Some(cost)) = (
            parse_decimal(cell(&record, Some(columns.quantity))),
            parse_decimal(cell(&record, Some(cost_col))),
        ) else {
            continue;
        };

        if let Some(range) = range {
            match parse_date(cell(&record, columns.date)) {
                Some(date) if range.contains(date) => {}
                _ => {
                    out_of_range += 1;
                    continue;
                }
            }
        }

        gold.push(GoldLine::new(
            cell(&record, Some(columns.order)),
            product,
            cell(&record, Some(columns.branch)),
            Warehouse::from_label(cell(&record, Some(columns.origin))),
            quantity,
            cost,
        ));
    }

    info!(
        "Loaded {} golden rows from {} ({} outside range)",
        gold.len(),
        path.display(),
        out_of_range
    );
    Ok(gold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use price_reconciliation::ResolutionMethod;
    use rust_decimal_macros::dec;
    use std::fs;

    const TRANSFER_HEADER: &str = "Orden,Almacén origen,Sucursal destino,Almacén destino,Fecha,Estatus,Cantidad,Departamento,Clave,Producto,Presentación,Costo,IEPS,IVA,Costo unitario";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_decimal_variants() {
        assert_eq!(parse_decimal("1,234.50"), Some(dec!(1234.50)));
        assert_eq!(parse_decimal(" $38.5 "), Some(dec!(38.5)));
        assert_eq!(parse_decimal("-2"), Some(dec!(-2)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("nan"), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 2, 3);
        assert_eq!(parse_date("2026-02-03"), expected);
        assert_eq!(parse_date("03/02/2026"), expected);
        assert_eq!(parse_date("2026-02-03 14:05:00"), expected);
        assert_eq!(parse_date("ayer"), None);
    }

    #[test]
    fn test_load_transfers_by_header_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "TransfersIssued_PV_2026-02-02_2026-02-08.csv",
            &format!(
                "{}\n\
                 9982-1,ALMACEN PRODUCTO TERMINADO,Panem - Punto Valle,PV,2026-02-03,Enviado,2,PANADERIA,001,Salsa Verde *,3,90.00,0,0,45.00\n\
                 9980-1,ALMACEN GENERAL,Panem - Punto Valle,PV,2026-02-04,Enviado,-1.5,ABARROTES,002,Harina,1 KG,-30,0,0,20\n\
                 9980-2,ALMACEN GENERAL,Panem - Punto Valle,PV,2026-02-04,Enviado,1,ABARROTES,003,,1,1,0,0,1\n",
                TRANSFER_HEADER
            ),
        );

        let lines = load_transfers(&path).unwrap();
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0].order_id, "9982-1");
        assert_eq!(lines[0].source_warehouse, Warehouse::FinishedProduct);
        assert_eq!(lines[0].branch, "Panem - Punto Valle");
        assert_eq!(lines[0].presentation_size, dec!(3));
        assert_eq!(lines[0].source_unit_cost, dec!(45.00));
        assert_eq!(lines[0].source_cost, dec!(90.00));
        assert_eq!(lines[0].category, "PANADERIA");
        assert_eq!(lines[0].date, NaiveDate::from_ymd_opt(2026, 2, 3));

        assert_eq!(lines[1].source_warehouse, Warehouse::General);
        assert!(lines[1].is_return());
        assert_eq!(lines[1].presentation_size, dec!(1));
    }

    #[test]
    fn test_load_transfers_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.csv", "Orden,Cantidad,Producto\n1,1,Pan\n");
        let err = load_transfers(&path).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { column: "Almacén origen", .. }));
    }

    #[test]
    fn test_load_transfers_bad_quantity() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "t.csv",
            &format!(
                "{}\n1,ALMACEN GENERAL,Panem - PV,PV,2026-02-03,E,dos,X,1,Pan,1,1,0,0,1\n",
                TRANSFER_HEADER
            ),
        );
        assert!(matches!(load_transfers(&path), Err(Error::Parse { row: 1, .. })));
    }

    #[test]
    fn test_collect_transfer_files_filters_week() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("PV");
        fs::create_dir(&nested).unwrap();
        write(&nested, "TransfersIssued_PV_2026-02-02_2026-02-08.csv", TRANSFER_HEADER);
        write(dir.path(), "TransfersIssued_Q_2026-02-02_2026-02-08.csv", TRANSFER_HEADER);
        write(dir.path(), "TransfersIssued_Q_2026-01-26_2026-02-01.csv", TRANSFER_HEADER);
        write(dir.path(), "notes_2026-02-02_2026-02-08.csv", TRANSFER_HEADER);

        let week = WeekRange::parse_label("2026-02-02_2026-02-08").unwrap();
        let files = collect_transfer_files(dir.path(), &week).unwrap();
        assert_eq!(files.len(), 2);

        let missing = collect_transfer_files(&dir.path().join("nope"), &week).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_load_price_table_drive_with_units() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "PRECIOS.csv",
            "NOMBRE WANSOFT,PRECIO DRIVE,UNIDAD,PRESENTACION\n\
             Salsa Verde,115.50,PZ,3\n\
             Crema de Danes,47.20,LT,\n\
             Sin precio,,PZ,1\n",
        );

        let table = load_price_table(&path, Warehouse::FinishedProduct, &ProductAliases::default()).unwrap();
        assert_eq!(table.len(), 2);

        let line = TransferLine::new(
            "1",
            "Panem - PV",
            Warehouse::FinishedProduct,
            "Salsa Verde *",
            dec!(1),
            Unit::Piece,
            dec!(1),
        );
        let resolved = price_reconciliation::resolve_price(&line, &table);
        assert_eq!(resolved.unit_price, dec!(38.50));
        assert_eq!(resolved.resolution_method, ResolutionMethod::DerivedFromPresentation);
    }

    #[test]
    fn test_load_price_table_prefers_drive_and_unit_over_unit_price() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "PRECIOS.csv",
            "NOMBRE WANSOFT,PRECIO DRIVE,UNIDAD,PRESENTACION,PRECIO UNITARIO\n\
             Crema de Danes,47.20,LT,0.5,94.40\n\
             Salsa Verde,,PZ,3,38.50\n",
        );

        let table = load_price_table(&path, Warehouse::FinishedProduct, &ProductAliases::default()).unwrap();
        let crema = table.lookup("crema de danes").unwrap();
        assert_eq!(crema.unit, Unit::Liter);
        assert_eq!(crema.source_price, dec!(47.20));
        assert_eq!(crema.presentation_size, dec!(0.5));

        let line = TransferLine::new(
            "1",
            "Panem - PV",
            Warehouse::FinishedProduct,
            "Crema de Danes",
            dec!(2),
            Unit::Liter,
            dec!(40),
        );
        let resolved = price_reconciliation::resolve_price(&line, &table);
        assert_eq!(resolved.unit_price, dec!(47.20));
        assert_eq!(resolved.resolution_method, ResolutionMethod::ExactUnit);

        // No drive price on the row: the unit price column still applies
        let salsa = table.lookup("salsa verde").unwrap();
        assert_eq!(salsa.source_price, dec!(38.50));
        assert_eq!(salsa.presentation_size, dec!(1));
    }

    #[test]
    fn test_load_price_table_presentation_with_unit_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "PRECIOS.csv",
            "NOMBRE WANSOFT,PRECIO DRIVE,UNIDAD,PRESENTACION\n\
             Salsa Verde,115.50,PZ,3 PZ\n\
             Salsa Roja,90,PZ,caja\n",
        );

        let table = load_price_table(&path, Warehouse::FinishedProduct, &ProductAliases::default()).unwrap();
        assert_eq!(table.lookup("salsa verde").map(|e| e.presentation_size), Some(dec!(3)));

        let line = |product: &str| {
            TransferLine::new(
                "1",
                "Panem - PV",
                Warehouse::FinishedProduct,
                product,
                dec!(1),
                Unit::Piece,
                dec!(30),
            )
        };
        let verde = price_reconciliation::resolve_price(&line("Salsa Verde"), &table);
        assert_eq!(verde.unit_price, dec!(38.50));
        assert_eq!(verde.resolution_method, ResolutionMethod::DerivedFromPresentation);

        // An unreadable presentation is flagged, not treated as 1
        let roja = price_reconciliation::resolve_price(&line("Salsa Roja"), &table);
        assert_eq!(roja.unit_price, dec!(30));
        assert_eq!(roja.resolution_method, ResolutionMethod::RawFallback);
        assert!(roja.has_issue(price_reconciliation::LineIssue::InvalidPresentation));
    }

    #[test]
    fn test_load_price_table_unit_price_column_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "AG_PRECIOS.csv",
            "Producto,Precio unitario\nHarina,20\nAzucar,18.5\n",
        );
        let table = load_price_table(&path, Warehouse::General, &ProductAliases::default()).unwrap();
        assert_eq!(table.lookup("azucar").map(|e| e.source_price), Some(dec!(18.5)));

        let dup = write(
            dir.path(),
            "DUP.csv",
            "NOMBRE WANSOFT,PRECIO DRIVE\nSalsa Roja,10\nSALSA ROJA *,10\n",
        );
        let err = load_price_table(&dup, Warehouse::FinishedProduct, &ProductAliases::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Reconciliation(price_reconciliation::Error::DuplicateReferenceEntry { .. })
        ));
    }

    #[test]
    fn test_load_gold_detects_header_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "gold.csv",
            "TRANSFERENCIAS DEL 02 AL 08 FEBRERO,,,,,,,,,,\n\
             ,,,,,,,,,,\n\
             #,Orden,Almacén origen,Sucursal destino,Almacén destino,Fecha,Cantidad,Departamento,Producto,Presentación,Costo\n\
             1,9982-1,ALMACEN PRODUCTO TERMINADO,Panem - Punto Valle,PV,2026-02-03,2,PAN,Salsa Verde,3,80\n\
             2,9982-2,ALMACEN GENERAL,Panem - Punto Valle,PV,2026-01-30,1,ABA,Harina,1,20\n\
             3,9982-3,ALMACEN GENERAL,Panem - Punto Valle,PV,2026-02-04,1,ABA,xx,1,20\n\
             4,9982-4,ALMACEN GENERAL,Panem - Punto Valle,PV,2026-02-04,,ABA,Azucar,1,20\n",
        );

        let all = load_gold(&path, None).unwrap();
        assert_eq!(all.len(), 2);

        let week = WeekRange::parse_label("2026-02-02_2026-02-08").unwrap();
        let in_week = load_gold(&path, Some(&week)).unwrap();
        assert_eq!(in_week.len(), 1);
        assert_eq!(in_week[0].order_id, "9982-1");
        assert_eq!(in_week[0].unit_cost, Some(dec!(40)));
        assert_eq!(in_week[0].source_warehouse, Warehouse::FinishedProduct);
    }

    #[test]
    fn test_load_gold_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "gold.csv", "a,b\n1,2\n");
        assert!(matches!(
            load_gold(&path, None),
            Err(Error::MissingColumn { column: "Orden", .. })
        ));
    }
}
