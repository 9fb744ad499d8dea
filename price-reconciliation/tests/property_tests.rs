//! Property-based tests for reconciliation invariants
//!
//! - Base units resolve to the reference price unchanged
//! - Piece prices are divided by the presentation size
//! - Unmatched lines keep their source unit cost
//! - Deterministic: same inputs → byte-identical outputs
//! - Partitioning: a line never resolves against another warehouse's table,
//!   even when both tables price the same product

use price_reconciliation::{
    reconcile_batch, resolve_price, PriceEntry, PriceTable, PriceTables, ResolutionMethod,
    TransferLine, Unit, Warehouse,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for positive prices (two decimals)
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for quantities, returns included
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (-50_000i64..50_000i64).prop_map(|milli| Decimal::new(milli, 3))
}

/// Strategy for presentation sizes > 0
fn presentation_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..500i64).prop_map(|tenths| Decimal::new(tenths, 1))
}

fn warehouse_strategy() -> impl Strategy<Value = Warehouse> {
    prop_oneof![Just(Warehouse::General), Just(Warehouse::FinishedProduct)]
}

fn product_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z]{3,10}( [A-Za-z]{3,10})?( \\*)?"
}

fn line_strategy() -> impl Strategy<Value = TransferLine> {
    (
        "[0-9]{4}-[0-9]",
        warehouse_strategy(),
        product_strategy(),
        quantity_strategy(),
        price_strategy(),
    )
        .prop_map(|(order, warehouse, product, quantity, unit_cost)| {
            TransferLine::new(
                order,
                "Panem - Punto Valle",
                warehouse,
                product,
                quantity,
                Unit::Piece,
                unit_cost,
            )
        })
}

fn line_for(product: &str, quantity: Decimal, source_unit_cost: Decimal) -> TransferLine {
    TransferLine::new(
        "1000-1",
        "Panem - Punto Valle",
        Warehouse::General,
        product,
        quantity,
        Unit::Piece,
        source_unit_cost,
    )
}

fn tables_for(lines: &[TransferLine]) -> PriceTables {
    // General prices every product it sees, FinishedProduct stays empty
    let mut seen = std::collections::BTreeSet::new();
    let general: Vec<PriceEntry> = lines
        .iter()
        .filter(|l| seen.insert(price_reconciliation::normalize_product_name(&l.product_name)))
        .map(|l| PriceEntry::new(l.product_name.clone(), Decimal::new(1234, 2), Unit::Kilogram, Decimal::ONE))
        .collect();

    PriceTables::new()
        .with_table(PriceTable::from_entries(Warehouse::General, general).unwrap())
        .unwrap()
        .with_table(PriceTable::empty(Warehouse::FinishedProduct))
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: LT/KG entries resolve exactly to the reference price
    #[test]
    fn prop_base_unit_is_exact(
        price in price_strategy(),
        quantity in quantity_strategy(),
        raw_cost in price_strategy(),
        liter in any::<bool>(),
    ) {
        let unit = if liter { Unit::Liter } else { Unit::Kilogram };
        let table = PriceTable::from_entries(
            Warehouse::General,
            // presentation size is ignored for base units
            vec![PriceEntry::new("Crema de Danes", price, unit, Decimal::new(25, 1))],
        ).unwrap();

        let resolved = resolve_price(&line_for("CREMA DE DANES *", quantity, raw_cost), &table);
        prop_assert_eq!(resolved.resolution_method, ResolutionMethod::ExactUnit);
        prop_assert_eq!(resolved.unit_price, price);
        prop_assert_eq!(resolved.line_cost, quantity * price);
    }

    /// Property: PZ entries divide by the presentation size
    #[test]
    fn prop_piece_divides_by_presentation(
        price in price_strategy(),
        presentation in presentation_strategy(),
        quantity in quantity_strategy(),
    ) {
        let table = PriceTable::from_entries(
            Warehouse::General,
            vec![PriceEntry::new("Salsa Verde", price, Unit::Piece, presentation)],
        ).unwrap();

        let resolved = resolve_price(&line_for("Salsa Verde *", quantity, Decimal::ONE), &table);
        prop_assert_eq!(resolved.resolution_method, ResolutionMethod::DerivedFromPresentation);
        prop_assert_eq!(resolved.unit_price, price / presentation);
        prop_assert!(!resolved.is_flagged());
    }

    /// Property: no entry → unmatched, source unit cost kept
    #[test]
    fn prop_unmatched_keeps_source_cost(line in line_strategy()) {
        let table = PriceTable::empty(line.source_warehouse);
        let resolved = resolve_price(&line, &table);

        prop_assert_eq!(resolved.resolution_method, ResolutionMethod::Unmatched);
        prop_assert_eq!(resolved.unit_price, line.source_unit_cost);
        prop_assert_eq!(resolved.line_cost, line.source_cost);
        prop_assert!(resolved.is_flagged());
    }

    /// Property: reconciling the same batch twice gives byte-identical output
    #[test]
    fn prop_reconcile_is_deterministic(lines in prop::collection::vec(line_strategy(), 0..40)) {
        let tables = tables_for(&lines);

        let first = reconcile_batch(&lines, &tables).unwrap();
        let second = reconcile_batch(&lines, &tables).unwrap();

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    /// Property: FinishedProduct lines never pick up General prices
    #[test]
    fn prop_warehouses_are_partitioned(lines in prop::collection::vec(line_strategy(), 1..40)) {
        let tables = tables_for(&lines);
        let outcome = reconcile_batch(&lines, &tables).unwrap();

        prop_assert_eq!(outcome.lines.len(), lines.len());
        for resolved in &outcome.lines {
            match resolved.line.source_warehouse {
                Warehouse::General => {
                    prop_assert_eq!(resolved.resolved.resolution_method, ResolutionMethod::ExactUnit);
                }
                _ => {
                    prop_assert_eq!(resolved.resolved.resolution_method, ResolutionMethod::Unmatched);
                    prop_assert_eq!(resolved.resolved.unit_price, resolved.line.source_unit_cost);
                }
            }
        }
    }

    /// Property: a product priced by both tables resolves to its own warehouse's price
    #[test]
    fn prop_shared_product_uses_own_warehouse_price(
        general_price in price_strategy(),
        finished_price in price_strategy(),
        origins in prop::collection::vec(warehouse_strategy(), 1..20),
        quantity in quantity_strategy(),
    ) {
        prop_assume!(general_price != finished_price);

        let entry = |price| PriceEntry::new("Salsa Roja", price, Unit::Liter, Decimal::ONE);
        let tables = PriceTables::new()
            .with_table(PriceTable::from_entries(Warehouse::General, vec![entry(general_price)]).unwrap())
            .unwrap()
            .with_table(PriceTable::from_entries(Warehouse::FinishedProduct, vec![entry(finished_price)]).unwrap())
            .unwrap();

        let lines: Vec<TransferLine> = origins
            .iter()
            .map(|&warehouse| {
                let mut line = line_for("SALSA ROJA *", quantity, Decimal::ONE);
                line.source_warehouse = warehouse;
                line
            })
            .collect();

        let outcome = reconcile_batch(&lines, &tables).unwrap();
        for resolved in &outcome.lines {
            let expected = match resolved.line.source_warehouse {
                Warehouse::General => general_price,
                _ => finished_price,
            };
            prop_assert_eq!(resolved.resolved.resolution_method, ResolutionMethod::ExactUnit);
            prop_assert_eq!(resolved.resolved.unit_price, expected);
        }
    }
}
