//! Reference price tables
//!
//! One table per origin warehouse. The same product can legitimately carry
//! different prices in different warehouses, so lines are only ever looked
//! up in the table of their own warehouse.

use crate::normalize::{normalize_product_name, ProductAliases};
use crate::types::{PriceEntry, Warehouse};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Reference prices of one warehouse, keyed by normalized product name
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    warehouse: Warehouse,
    entries: BTreeMap<String, PriceEntry>,
    aliases: ProductAliases,
}

impl PriceTable {
    /// Empty table (every lookup misses)
    pub fn empty(warehouse: Warehouse) -> Self {
        Self {
            warehouse,
            entries: BTreeMap::new(),
            aliases: ProductAliases::default(),
        }
    }

    /// Build a table, rejecting duplicate normalized names
    ///
    /// Entries whose name normalizes to an empty string are skipped.
    pub fn from_entries(
        warehouse: Warehouse,
        entries: impl IntoIterator<Item = PriceEntry>,
    ) -> Result<Self> {
        let mut table = Self::empty(warehouse);

        for entry in entries {
            let key = normalize_product_name(&entry.product_name);
            if key.is_empty() {
                warn!("Skipping {} price entry with empty product name", warehouse.code());
                continue;
            }

            if table.entries.contains_key(&key) {
                return Err(Error::DuplicateReferenceEntry {
                    warehouse,
                    product: key,
                });
            }

            table.entries.insert(key, entry);
        }

        info!("Loaded {} price table with {} entries", warehouse.code(), table.entries.len());
        Ok(table)
    }

    /// Attach typo aliases, consulted only when the direct lookup misses
    pub fn with_aliases(mut self, aliases: ProductAliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// Warehouse this table prices
    pub fn warehouse(&self) -> Warehouse {
        self.warehouse
    }

    /// Look up a normalized product name
    pub fn lookup(&self, normalized: &str) -> Option<&PriceEntry> {
        if let Some(entry) = self.entries.get(normalized) {
            return Some(entry);
        }

        let canonical = self.aliases.resolve(normalized)?;
        let entry = self.entries.get(canonical);
        if entry.is_some() {
            debug!("Resolved {} via alias {}", normalized, canonical);
        }
        entry
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PriceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Warehouse -> price table routing for one reconciliation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTables {
    tables: BTreeMap<Warehouse, PriceTable>,
}

impl PriceTables {
    /// Create empty routing
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table for its warehouse
    pub fn register(&mut self, table: PriceTable) -> Result<()> {
        let warehouse = table.warehouse();
        if self.tables.contains_key(&warehouse) {
            return Err(Error::Config(format!(
                "Price table for {} registered twice",
                warehouse
            )));
        }
        self.tables.insert(warehouse, table);
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_table(mut self, table: PriceTable) -> Result<Self> {
        self.register(table)?;
        Ok(self)
    }

    /// Table for a warehouse
    pub fn get(&self, warehouse: Warehouse) -> Result<&PriceTable> {
        self.tables
            .get(&warehouse)
            .ok_or(Error::UnregisteredWarehouse(warehouse))
    }

    /// Warehouse has a table
    pub fn contains(&self, warehouse: Warehouse) -> bool {
        self.tables.contains_key(&warehouse)
    }

    /// Registered warehouses
    pub fn warehouses(&self) -> impl Iterator<Item = Warehouse> + '_ {
        self.tables.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Unit;
    use rust_decimal_macros::dec;

    fn entry(name: &str, price: rust_decimal::Decimal) -> PriceEntry {
        PriceEntry::new(name, price, Unit::Piece, dec!(1))
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let result = PriceTable::from_entries(
            Warehouse::FinishedProduct,
            vec![entry("Salsa Roja", dec!(10)), entry("SALSA ROJA *", dec!(12))],
        );

        assert_eq!(
            result,
            Err(Error::DuplicateReferenceEntry {
                warehouse: Warehouse::FinishedProduct,
                product: "salsa roja".to_string(),
            })
        );
    }

    #[test]
    fn test_same_name_in_other_warehouse_is_fine() {
        let pt = PriceTable::from_entries(Warehouse::FinishedProduct, vec![entry("Salsa Roja", dec!(10))]).unwrap();
        let ag = PriceTable::from_entries(Warehouse::General, vec![entry("Salsa Roja", dec!(12))]).unwrap();

        let tables = PriceTables::new().with_table(pt).unwrap().with_table(ag).unwrap();
        assert_eq!(tables.get(Warehouse::General).unwrap().lookup("salsa roja").unwrap().source_price, dec!(12));
        assert_eq!(tables.get(Warehouse::Other), Err(Error::UnregisteredWarehouse(Warehouse::Other)));
    }

    #[test]
    fn test_alias_lookup() {
        let table = PriceTable::from_entries(
            Warehouse::FinishedProduct,
            vec![entry("Mayonesa de Panem *", dec!(25.50))],
        )
        .unwrap()
        .with_aliases(ProductAliases::from_pairs([("mayones de panem", "mayonesa de panem")]));

        assert!(table.lookup("mayones de panem").is_some());
        assert!(table.lookup("mayonesa").is_none());
    }

    #[test]
    fn test_register_twice_rejected() {
        let mut tables = PriceTables::new();
        tables.register(PriceTable::empty(Warehouse::General)).unwrap();
        assert!(matches!(
            tables.register(PriceTable::empty(Warehouse::General)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_blank_names_skipped() {
        let table = PriceTable::from_entries(
            Warehouse::General,
            vec![entry(" * ", dec!(1)), entry("", dec!(2)), entry("Harina", dec!(3))],
        )
        .unwrap();
        assert_eq!(table.len(), 1);
    }
}
