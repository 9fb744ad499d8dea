//! Weekly reporting windows (Monday to Sunday)

use crate::discrepancy::Scope;
use crate::{Error, Result};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive date range of one reporting week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekRange {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl WeekRange {
    /// Explicit range; need not be Monday to Sunday
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidInput(format!(
                "Week end {} before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a `YYYY-MM-DD_YYYY-MM-DD` label
    pub fn parse_label(label: &str) -> Result<Self> {
        let (start, end) = label
            .split_once('_')
            .ok_or_else(|| Error::InvalidInput(format!("Malformed week label {}", label)))?;
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| Error::InvalidInput(format!("Malformed date {} in {}: {}", s, label, e)))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// `YYYY-MM-DD_YYYY-MM-DD`
    pub fn label(&self) -> String {
        format!("{}_{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }

    /// Date falls inside the range
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The two ranges share at least one day
    pub fn overlaps(&self, other: &WeekRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Scope covering this week and all branches
    pub fn scope(&self) -> Scope {
        Scope::new(self.label(), self.start, self.end)
    }
}

impl std::fmt::Display for WeekRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Monday-to-Sunday week containing `date`
///
/// Fails only when the week runs off the calendar chrono can represent.
pub fn week_containing(date: NaiveDate) -> Result<WeekRange> {
    let monday = date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())));
    let sunday = monday.and_then(|m| m.checked_add_days(Days::new(6)));
    match (monday, sunday) {
        (Some(start), Some(end)) => Ok(WeekRange { start, end }),
        _ => Err(Error::InvalidInput(format!("No full week around {}", date))),
    }
}

/// `num_weeks` consecutive weeks ending with the week containing `end`, most recent first
pub fn build_week_ranges(end: NaiveDate, num_weeks: usize) -> Result<Vec<WeekRange>> {
    if num_weeks == 0 {
        return Err(Error::InvalidInput("Number of weeks must be > 0".to_string()));
    }

    let last = week_containing(end)?;
    let out_of_range = || {
        Error::InvalidInput(format!(
            "{} weeks before {} is outside the supported calendar",
            num_weeks, end
        ))
    };

    let offset = |i: usize| {
        u64::try_from(i)
            .ok()
            .and_then(|i| i.checked_mul(7))
            .map(Days::new)
            .ok_or_else(out_of_range)
    };

    // The oldest week bounds every other one
    last.start
        .checked_sub_days(offset(num_weeks - 1)?)
        .ok_or_else(out_of_range)?;

    (0..num_weeks)
        .map(|i| {
            let offset = offset(i)?;
            let start = last.start.checked_sub_days(offset).ok_or_else(out_of_range)?;
            let end = last.end.checked_sub_days(offset).ok_or_else(out_of_range)?;
            Ok(WeekRange { start, end })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_single_week_from_sunday_monday_and_midweek() {
        for end in [date(2026, 2, 8), date(2026, 2, 2), date(2026, 2, 4)] {
            let weeks = build_week_ranges(end, 1).unwrap();
            assert_eq!(weeks.len(), 1);
            assert_eq!(weeks[0].start, date(2026, 2, 2));
            assert_eq!(weeks[0].end, date(2026, 2, 8));
        }
    }

    #[test]
    fn test_two_weeks_most_recent_first() {
        let weeks = build_week_ranges(date(2026, 2, 8), 2).unwrap();
        assert_eq!(weeks[0].label(), "2026-02-02_2026-02-08");
        assert_eq!(weeks[1].label(), "2026-01-26_2026-02-01");
    }

    #[test]
    fn test_twelve_consecutive_weeks() {
        let weeks = build_week_ranges(date(2026, 2, 8), 12).unwrap();
        assert_eq!(weeks.len(), 12);
        for (i, week) in weeks.iter().enumerate() {
            assert_eq!(week.start.weekday(), chrono::Weekday::Mon);
            assert_eq!(week.end.weekday(), chrono::Weekday::Sun);
            assert_eq!((week.end - week.start).num_days(), 6);
            if i + 1 < weeks.len() {
                assert_eq!((week.start - weeks[i + 1].end).num_days(), 1);
            }
        }
    }

    #[test]
    fn test_zero_weeks_rejected() {
        assert!(matches!(
            build_week_ranges(date(2026, 2, 8), 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_week_count_beyond_calendar_rejected() {
        assert!(matches!(
            build_week_ranges(date(2026, 2, 8), 20_000_000),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            build_week_ranges(date(2026, 2, 8), usize::MAX),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_label_round_trip_and_validation() {
        let week = WeekRange::parse_label("2026-02-02_2026-02-07").unwrap();
        assert_eq!(week.end, date(2026, 2, 7));
        assert!(week.contains(date(2026, 2, 7)));
        assert!(!week.contains(date(2026, 2, 8)));
        assert!(week.overlaps(&build_week_ranges(date(2026, 2, 8), 1).unwrap()[0]));
        assert!(!week.overlaps(&WeekRange::parse_label("2026-02-08_2026-02-14").unwrap()));
        assert!(WeekRange::parse_label("2026-02-08_2026-02-02").is_err());
        assert!(WeekRange::parse_label("not-a-week").is_err());
    }
}
