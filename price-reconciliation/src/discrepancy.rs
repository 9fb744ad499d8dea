//! Discrepancy comparison against golden totals

use crate::aggregation::ExcludedDestinations;
use crate::calendar::WeekRange;
use crate::{Error, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default tolerance: one currency unit
pub const DEFAULT_TOLERANCE: Decimal = Decimal::ONE;

/// What a total covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Human readable identifier (usually the week label)
    pub label: String,

    /// First day included
    pub start: NaiveDate,

    /// Last day included
    pub end: NaiveDate,

    /// Destination branches included; empty means "all branches"
    pub branches: BTreeSet<String>,

    /// Destinations left out of the total
    #[serde(default)]
    pub excluded_destinations: BTreeSet<String>,
}

impl Scope {
    /// Scope over all branches
    pub fn new(label: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            label: label.into(),
            start,
            end,
            branches: BTreeSet::new(),
            excluded_destinations: BTreeSet::new(),
        }
    }

    /// Restrict to a branch set
    pub fn with_branches<I, S>(mut self, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.branches = branches.into_iter().map(Into::into).collect();
        self
    }

    /// Leave the given destinations out
    pub fn excluding(mut self, excluded: &ExcludedDestinations) -> Self {
        self.excluded_destinations = excluded.iter().map(str::to_string).collect();
        self
    }

    /// Two scopes cover the same dates, branches and exclusions
    ///
    /// The label is descriptive and does not take part.
    pub fn same_coverage(&self, other: &Scope) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.branches == other.branches
            && self.excluded_destinations == other.excluded_destinations
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}..{}]", self.label, self.start, self.end)?;
        if !self.branches.is_empty() {
            let branches: Vec<&str> = self.branches.iter().map(String::as_str).collect();
            write!(f, " ({})", branches.join(", "))?;
        }
        if !self.excluded_destinations.is_empty() {
            let excluded: Vec<&str> = self.excluded_destinations.iter().map(String::as_str).collect();
            write!(f, " excluding {}", excluded.join(", "))?;
        }
        Ok(())
    }
}

/// A total cost over a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedTotal {
    /// Coverage
    pub scope: Scope,

    /// Total cost
    pub total: Decimal,
}

impl ScopedTotal {
    /// Create new scoped total
    pub fn new(scope: Scope, total: Decimal) -> Self {
        Self { scope, total }
    }
}

/// Outcome of comparing our total with a reference total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancySummary {
    /// Scope identifier
    pub scope: String,

    /// Our total
    pub ours: Decimal,

    /// Reference total
    pub reference: Decimal,

    /// ours - reference
    pub difference: Decimal,

    /// difference / reference * 100, absent for a zero reference
    pub percentage: Option<Decimal>,

    /// |difference| < tolerance
    pub within_tolerance: bool,

    /// Tolerance used
    pub tolerance: Decimal,
}

impl DiscrepancySummary {
    /// Difference is at least the tolerance
    pub fn exceeds_tolerance(&self) -> bool {
        !self.within_tolerance
    }
}

/// Compare two totals computed independently over the same scope
pub fn compare_totals(
    ours: &ScopedTotal,
    reference: &ScopedTotal,
    tolerance: Decimal,
) -> Result<DiscrepancySummary> {
    if !ours.scope.same_coverage(&reference.scope) {
        return Err(Error::ScopeMismatch {
            ours: ours.scope.to_string(),
            reference: reference.scope.to_string(),
        });
    }
    if tolerance.is_sign_negative() {
        return Err(Error::InvalidInput(format!("Negative tolerance {}", tolerance)));
    }

    let difference = ours.total - reference.total;
    let percentage = percent_of(difference, reference.total);

    let summary = DiscrepancySummary {
        scope: ours.scope.label.clone(),
        ours: ours.total,
        reference: reference.total,
        difference,
        percentage,
        within_tolerance: difference.abs() < tolerance,
        tolerance,
    };

    if summary.exceeds_tolerance() {
        tracing::warn!(
            "{}: ours {} vs reference {} (diff {})",
            summary.scope,
            summary.ours,
            summary.reference,
            summary.difference
        );
    }

    Ok(summary)
}

/// `part / whole * 100`, `None` when `whole` is zero
pub fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole.is_zero() {
        return None;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
}

/// Golden totals known for one range
///
/// The dates covered are those of the range label the reference is
/// configured under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoldReference {
    /// Sum of the golden detail sheets
    pub detail_total: Decimal,

    /// Figure on the golden summary sheet
    pub summary_total: Decimal,

    /// The summary figure counts transfers to excluded destinations
    #[serde(default)]
    pub includes_excluded_destinations: bool,
}

impl GoldReference {
    /// Reference whose summary figure leaves excluded destinations out
    pub fn new(detail_total: Decimal, summary_total: Decimal) -> Self {
        Self {
            detail_total,
            summary_total,
            includes_excluded_destinations: false,
        }
    }

    /// Coverage of the summary figure over `range`
    pub fn scope(&self, range: &WeekRange, excluded: &ExcludedDestinations) -> Scope {
        if self.includes_excluded_destinations {
            range.scope()
        } else {
            range.scope().excluding(excluded)
        }
    }

    /// Summary figure with its coverage
    pub fn summary(&self, range: &WeekRange, excluded: &ExcludedDestinations) -> ScopedTotal {
        ScopedTotal::new(self.scope(range, excluded), self.summary_total)
    }
}
