//! Configuration for the reporting pipeline

use crate::{Error, Result};
use price_reconciliation::ReconciliationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data root; batch and output directories hang off it
    pub data_root: PathBuf,

    /// Transfer export directory (default `<data_root>/b_clean/transfers/batch`)
    pub batch_dir: Option<PathBuf>,

    /// Report directory (default `<data_root>/c_processed/transfers/weekly`)
    pub output_dir: Option<PathBuf>,

    /// Reference price tables
    pub price_tables: PriceTablePaths,

    /// Engine settings
    pub reconciliation: ReconciliationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            batch_dir: None,
            output_dir: None,
            price_tables: PriceTablePaths::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }
}

/// Price table locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTablePaths {
    /// ALMACEN PRODUCTO TERMINADO prices
    pub finished_product: PathBuf,

    /// ALMACEN GENERAL prices; a missing file leaves General lines at their ERP cost
    pub general: Option<PathBuf>,
}

impl Default for PriceTablePaths {
    fn default() -> Self {
        Self {
            finished_product: PathBuf::from("PRECIOS.csv"),
            general: Some(PathBuf::from("AG_PRECIOS.csv")),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.reconciliation.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `TRANSFER_REPORTS_*` and `RECONCILIATION_*` overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(data_root) = std::env::var("TRANSFER_REPORTS_DATA_ROOT") {
            self.data_root = PathBuf::from(data_root);
        }

        if let Ok(batch_dir) = std::env::var("TRANSFER_REPORTS_BATCH_DIR") {
            self.batch_dir = Some(PathBuf::from(batch_dir));
        }

        if let Ok(output_dir) = std::env::var("TRANSFER_REPORTS_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(output_dir));
        }

        if let Ok(path) = std::env::var("TRANSFER_REPORTS_PRECIOS_PATH") {
            self.price_tables.finished_product = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("TRANSFER_REPORTS_AG_PRECIOS_PATH") {
            self.price_tables.general = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        self.reconciliation.apply_env_overrides()?;
        Ok(())
    }

    /// Directory holding `TransfersIssued_*.csv` exports
    pub fn batch_dir(&self) -> PathBuf {
        self.batch_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join("b_clean").join("transfers").join("batch"))
    }

    /// Directory reports are written to
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            self.data_root
                .join("c_processed")
                .join("transfers")
                .join("weekly")
        })
    }
}
