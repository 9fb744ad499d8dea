//! Configuration for price reconciliation

use crate::aggregation::{AlertThresholds, ExcludedDestinations};
use crate::calendar::WeekRange;
use crate::discrepancy::{GoldReference, DEFAULT_TOLERANCE};
use crate::investigation::InvestigationThresholds;
use crate::normalize::ProductAliases;
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Reconciliation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Absolute difference below which totals agree
    pub tolerance: Decimal,

    /// Correction alert thresholds
    pub alerts: AlertThresholds,

    /// Destinations left out of gold-comparable totals
    pub excluded_destinations: ExcludedDestinations,

    /// Product typo aliases (variant -> canonical)
    pub product_aliases: ProductAliases,

    /// Golden totals by week label
    pub gold_references: BTreeMap<String, GoldReference>,

    /// When golden unit prices are trusted by the price investigation
    pub investigation: InvestigationThresholds,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        let mut gold_references = BTreeMap::new();
        gold_references.insert(
            "2026-02-02_2026-02-07".to_string(),
            GoldReference::new(Decimal::from(311_794), Decimal::from(283_368)),
        );

        Self {
            tolerance: DEFAULT_TOLERANCE,
            alerts: AlertThresholds::default(),
            excluded_destinations: ExcludedDestinations::new(["Panem - CEDIS"]),
            product_aliases: ProductAliases::from_pairs([("mayones de panem *", "mayonesa de panem *")]),
            gold_references,
            investigation: InvestigationThresholds::default(),
        }
    }
}

impl ReconciliationConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse TOML
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ReconciliationConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `RECONCILIATION_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(tolerance) = std::env::var("RECONCILIATION_TOLERANCE") {
            self.tolerance = Decimal::from_str(tolerance.trim()).map_err(|e| {
                Error::Config(format!("RECONCILIATION_TOLERANCE={}: {}", tolerance, e))
            })?;
        }

        if let Ok(excluded) = std::env::var("RECONCILIATION_EXCLUDED_DESTINATIONS") {
            self.excluded_destinations = ExcludedDestinations::new(
                excluded.split(',').map(str::trim).filter(|s| !s.is_empty()),
            );
        }

        self.validate()
    }

    /// Check invariants
    pub fn validate(&self) -> Result<()> {
        if self.tolerance.is_sign_negative() {
            return Err(Error::Config(format!("tolerance must be >= 0, got {}", self.tolerance)));
        }
        if self.alerts.medium_pct > self.alerts.high_pct {
            return Err(Error::Config(format!(
                "alerts.medium_pct {} above alerts.high_pct {}",
                self.alerts.medium_pct, self.alerts.high_pct
            )));
        }
        self.investigation.validate()?;
        for label in self.gold_references.keys() {
            WeekRange::parse_label(label)
                .map_err(|e| Error::Config(format!("gold_references.{}: {}", label, e)))?;
        }
        Ok(())
    }
}
