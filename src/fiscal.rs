// src/fiscal.rs

use std::fmt;

use chrono::{Datelike, NaiveDate};

const FIRST_MONTH: u32 = 4;

/// A fiscal year, named after the calendar year in which its April 1 falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiscalYear(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearClass {
    /// Captured once, never rewritten.
    Historical,
    /// Rewritten on every successful run.
    Current,
}

impl FiscalYear {
    pub fn of(date: NaiveDate) -> Self {
        if date.month() >= FIRST_MONTH {
            FiscalYear(date.year())
        } else {
            FiscalYear(date.year() - 1)
        }
    }

    pub fn year(self) -> i32 {
        self.0
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0, FIRST_MONTH, 1).expect("April 1 exists in every year")
    }

    pub fn last_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0 + 1, 3, 31).expect("March 31 exists in every year")
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        FiscalYear::of(date) == self
    }

    /// `Current` for the reference date's own year, `Historical` for earlier
    /// years down to `floor`, `None` outside that span.
    pub fn classify(self, reference: NaiveDate, floor: i32) -> Option<YearClass> {
        let current = FiscalYear::of(reference);
        if self == current {
            Some(YearClass::Current)
        } else if self.0 >= floor && self < current {
            Some(YearClass::Historical)
        } else {
            None
        }
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY{}", self.0)
    }
}

/// Fiscal year of `reference`: the calendar year from April on, the previous one before.
pub fn fiscal_year(reference: NaiveDate) -> i32 {
    FiscalYear::of(reference).year()
}

/// Every historical year from `floor` up to, not including, the current one.
pub fn historical_years(reference: NaiveDate, floor: i32) -> Vec<FiscalYear> {
    (floor..=fiscal_year(reference))
        .map(FiscalYear)
        .filter(|y| y.classify(reference, floor) == Some(YearClass::Historical))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_boundary() {
        assert_eq!(fiscal_year(d(2026, 3, 31)), 2025);
        assert_eq!(fiscal_year(d(2026, 4, 1)), 2026);
        assert_eq!(fiscal_year(d(2026, 1, 1)), 2025);
        assert_eq!(fiscal_year(d(2025, 12, 31)), 2025);
    }

    #[test]
    fn test_window() {
        let fy = FiscalYear(2025);
        assert_eq!(fy.first_day(), d(2025, 4, 1));
        assert_eq!(fy.last_day(), d(2026, 3, 31));
        assert!(fy.contains(d(2025, 4, 1)));
        assert!(fy.contains(d(2026, 3, 31)));
        assert!(!fy.contains(d(2025, 3, 31)));
        assert!(!fy.contains(d(2026, 4, 1)));
        assert_eq!(fy.to_string(), "FY2025");
    }

    #[test]
    fn test_classify() {
        let today = d(2026, 10, 19);
        assert_eq!(FiscalYear(2026).classify(today, 2005), Some(YearClass::Current));
        assert_eq!(FiscalYear(2025).classify(today, 2005), Some(YearClass::Historical));
        assert_eq!(FiscalYear(2005).classify(today, 2005), Some(YearClass::Historical));
        assert_eq!(FiscalYear(2004).classify(today, 2005), None);
        assert_eq!(FiscalYear(2027).classify(today, 2005), None);
    }

    #[test]
    fn test_historical_years() {
        let years = historical_years(d(2026, 2, 1), 2022);
        assert_eq!(years, vec![FiscalYear(2022), FiscalYear(2023), FiscalYear(2024)]);
        assert!(historical_years(d(2026, 2, 1), 2030).is_empty());
    }
}
