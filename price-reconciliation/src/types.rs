//! Core types for price reconciliation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Origin warehouse category of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Warehouse {
    /// ALMACEN GENERAL (raw goods)
    General,
    /// ALMACEN PRODUCTO TERMINADO (finished product)
    FinishedProduct,
    /// Any other origin
    Other,
}

impl Warehouse {
    /// Classify a raw origin label as exported by the ERP
    pub fn from_label(label: &str) -> Self {
        let upper = label.trim().to_uppercase();
        if upper.contains("PRODUCTO TERMINADO") {
            Warehouse::FinishedProduct
        } else if upper.contains("ALMACEN GENERAL") || upper.contains("ALMACÉN GENERAL") {
            Warehouse::General
        } else {
            Warehouse::Other
        }
    }

    /// Short code used in report columns
    pub fn code(&self) -> &'static str {
        match self {
            Warehouse::General => "AG",
            Warehouse::FinishedProduct => "PT",
            Warehouse::Other => "OTHER",
        }
    }

    /// Label in the ERP's own spelling
    pub fn label(&self) -> &'static str {
        match self {
            Warehouse::General => "ALMACEN GENERAL",
            Warehouse::FinishedProduct => "ALMACEN PRODUCTO TERMINADO",
            Warehouse::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Unit of measure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// LT
    Liter,
    /// KG
    Kilogram,
    /// PZ
    Piece,
    /// Anything the reference sheets use that we do not recognise
    Other(String),
}

impl Unit {
    /// Parse a unit label (`LT`, `KG`, `PZ` and common spellings)
    pub fn parse(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "LT" | "L" | "LTS" | "LITRO" | "LITROS" => Unit::Liter,
            "KG" | "KGS" | "KILO" | "KILOS" | "KILOGRAMO" | "KILOGRAMOS" => Unit::Kilogram,
            "PZ" | "PZA" | "PZAS" | "PIEZA" | "PIEZAS" => Unit::Piece,
            other => Unit::Other(other.to_string()),
        }
    }

    /// Short code
    pub fn code(&self) -> &str {
        match self {
            Unit::Liter => "LT",
            Unit::Kilogram => "KG",
            Unit::Piece => "PZ",
            Unit::Other(label) => label,
        }
    }

    /// Reference price is already per base unit
    pub fn is_base_unit(&self) -> bool {
        matches!(self, Unit::Liter | Unit::Kilogram)
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One inventory movement of one product on one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLine {
    /// Order identifier (groups lines of one transaction)
    pub order_id: String,

    /// Destination branch
    pub branch: String,

    /// Origin warehouse
    pub source_warehouse: Warehouse,

    /// Product label as received from the ERP
    pub product_name: String,

    /// Quantity moved (negative for returns)
    pub quantity: Decimal,

    /// Unit of measure
    pub unit: Unit,

    /// Units per package
    pub presentation_size: Decimal,

    /// Unit cost reported by the ERP
    pub source_unit_cost: Decimal,

    /// Line cost reported by the ERP
    pub source_cost: Decimal,

    /// Department / category
    pub category: String,

    /// Transfer date
    pub date: Option<NaiveDate>,
}

impl TransferLine {
    /// Create a line with the minimum set of fields
    ///
    /// The raw line cost is derived from quantity and unit cost; presentation
    /// size defaults to one.
    pub fn new(
        order_id: impl Into<String>,
        branch: impl Into<String>,
        source_warehouse: Warehouse,
        product_name: impl Into<String>,
        quantity: Decimal,
        unit: Unit,
        source_unit_cost: Decimal,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            branch: branch.into(),
            source_warehouse,
            product_name: product_name.into(),
            quantity,
            unit,
            presentation_size: Decimal::ONE,
            source_unit_cost,
            source_cost: quantity * source_unit_cost,
            category: String::new(),
            date: None,
        }
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the transfer date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Line is a return
    pub fn is_return(&self) -> bool {
        self.quantity.is_sign_negative() && !self.quantity.is_zero()
    }
}

/// Reference unit price for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// Canonical product label
    pub product_name: String,

    /// Price as published by the reference sheet
    pub source_price: Decimal,

    /// Unit the price refers to
    pub unit: Unit,

    /// Units per package
    pub presentation_size: Decimal,
}

impl PriceEntry {
    /// Create new price entry
    pub fn new(
        product_name: impl Into<String>,
        source_price: Decimal,
        unit: Unit,
        presentation_size: Decimal,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            source_price,
            unit,
            presentation_size,
        }
    }
}

/// How a unit price was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionMethod {
    /// Reference price is per base unit
    ExactUnit,
    /// Reference package price divided by presentation size
    DerivedFromPresentation,
    /// Entry found but unusable, kept the raw cost
    RawFallback,
    /// No entry found, kept the raw cost
    Unmatched,
}

impl ResolutionMethod {
    /// Column value
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::ExactUnit => "EXACT_UNIT",
            ResolutionMethod::DerivedFromPresentation => "DERIVED_FROM_PRESENTATION",
            ResolutionMethod::RawFallback => "RAW_FALLBACK",
            ResolutionMethod::Unmatched => "UNMATCHED",
        }
    }

    /// Price came from a reference table
    pub fn is_matched(&self) -> bool {
        matches!(
            self,
            ResolutionMethod::ExactUnit | ResolutionMethod::DerivedFromPresentation
        )
    }
}

/// Per-line audit flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineIssue {
    /// No reference entry under the normalized name
    UnmatchedProduct,
    /// Presentation size <= 0 where a division was needed
    InvalidPresentation,
    /// Reference entry has a unit we do not recognise
    UnknownUnit,
}

impl LineIssue {
    /// Column value
    pub fn as_str(&self) -> &'static str {
        match self {
            LineIssue::UnmatchedProduct => "UNMATCHED_PRODUCT",
            LineIssue::InvalidPresentation => "INVALID_PRESENTATION",
            LineIssue::UnknownUnit => "UNKNOWN_UNIT",
        }
    }
}

/// Reconciliation output for one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    /// Resolved unit price
    pub unit_price: Decimal,

    /// How it was obtained
    pub resolution_method: ResolutionMethod,

    /// quantity × unit_price, unrounded
    pub line_cost: Decimal,

    /// Normalized product name used as join key
    pub normalized_name: String,

    /// Audit flags raised while resolving, in the order they were found
    pub issues: Vec<LineIssue>,
}

impl ResolvedPrice {
    /// Any audit flag was raised
    pub fn is_flagged(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Whether `issue` was raised
    pub fn has_issue(&self, issue: LineIssue) -> bool {
        self.issues.contains(&issue)
    }
}

/// A transfer line together with its resolved price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLine {
    /// Input line
    pub line: TransferLine,

    /// Resolution
    pub resolved: ResolvedPrice,
}

impl ResolvedLine {
    /// Cost as reported by the ERP
    pub fn cost_before(&self) -> Decimal {
        self.line.source_cost
    }

    /// Cost after applying the resolved price
    pub fn cost_after(&self) -> Decimal {
        self.resolved.line_cost
    }

    /// Resolved cost differs from the ERP cost
    pub fn cost_changed(&self) -> bool {
        self.cost_before() != self.cost_after()
    }
}

/// One row of the unmatched/flagged products report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedProduct {
    /// Normalized product name
    pub normalized_name: String,

    /// Warehouses the flagged lines came from
    pub warehouses: BTreeSet<Warehouse>,

    /// Number of flagged lines
    pub occurrences: usize,

    /// Total quantity on flagged lines
    pub total_quantity: Decimal,

    /// Kinds of flags raised
    pub issues: BTreeSet<LineIssue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_warehouse_from_label() {
        assert_eq!(Warehouse::from_label(" ALMACEN GENERAL "), Warehouse::General);
        assert_eq!(
            Warehouse::from_label("almacen producto terminado"),
            Warehouse::FinishedProduct
        );
        assert_eq!(Warehouse::from_label("CEDIS"), Warehouse::Other);
    }

    #[test]
    fn test_unit_parse() {
        assert_eq!(Unit::parse("lt"), Unit::Liter);
        assert_eq!(Unit::parse(" KG "), Unit::Kilogram);
        assert_eq!(Unit::parse("PZ"), Unit::Piece);
        assert_eq!(Unit::parse("caja"), Unit::Other("CAJA".to_string()));
        assert!(Unit::Liter.is_base_unit());
        assert!(!Unit::Piece.is_base_unit());
    }

    #[test]
    fn test_transfer_line_defaults() {
        let line = TransferLine::new(
            "9982-1",
            "Panem - Punto Valle",
            Warehouse::FinishedProduct,
            "Salsa Verde *",
            dec!(-2),
            Unit::Piece,
            dec!(40),
        );

        assert_eq!(line.presentation_size, Decimal::ONE);
        assert_eq!(line.source_cost, dec!(-80));
        assert!(line.is_return());
    }
}
