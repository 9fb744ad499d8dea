//! Product name normalization
//!
//! The ERP appends cosmetic suffixes to otherwise identical product labels
//! (`"Salsa Verde *"`, `"Salsa Verde*"`, `"SALSA  VERDE"`). Every join between
//! transfer lines, price tables and golden rows goes through
//! [`normalize_product_name`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

lazy_static! {
    static ref TRAILING_MARKERS: Regex = Regex::new(r"[\s*]+$").expect("valid marker pattern");
}

/// Normalize a product label into its join key
///
/// Trims, strips trailing `*` markers, collapses inner whitespace and
/// lowercases.
pub fn normalize_product_name(raw: &str) -> String {
    let stripped = TRAILING_MARKERS.replace(raw.trim(), "");
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Known typo aliases, normalized variant -> normalized canonical name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ProductAliases(BTreeMap<String, String>);

impl ProductAliases {
    /// Build from raw (variant, canonical) pairs; both sides are normalized
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| {
                    (
                        normalize_product_name(k.as_ref()),
                        normalize_product_name(v.as_ref()),
                    )
                })
                .collect(),
        )
    }

    /// Canonical name for a normalized variant
    pub fn resolve(&self, normalized: &str) -> Option<&str> {
        self.0.get(normalized).map(String::as_str)
    }

    /// Number of aliases
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No aliases configured
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for ProductAliases {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::from_pairs(map)
    }
}

impl From<ProductAliases> for BTreeMap<String, String> {
    fn from(aliases: ProductAliases) -> Self {
        aliases.0
    }
}
