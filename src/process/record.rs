use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

pub const PERIODS_PER_DAY: u8 = 48;
const PERIOD_MINUTES: i64 = 30;

/// One spot price: a 30-minute settlement period of one day in one area.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriceRecord {
    pub date: NaiveDate,
    /// 1..=48, period 1 starts at midnight.
    pub period_index: u8,
    pub area: String,
    pub price: Decimal,
}

impl PriceRecord {
    pub fn is_valid_period(period_index: u8) -> bool {
        (1..=PERIODS_PER_DAY).contains(&period_index)
    }

    /// Start of the settlement period.
    pub fn start(&self) -> NaiveDateTime {
        let midnight = self.date.and_time(chrono::NaiveTime::MIN);
        midnight + Duration::minutes((i64::from(self.period_index) - 1) * PERIOD_MINUTES)
    }

    /// `HH:MM` label of the period start, as shown by downstream readers.
    pub fn time_label(&self) -> String {
        self.start().format("%H:%M").to_string()
    }

    /// Sort / uniqueness key: one price per date, period and area.
    pub fn key(&self) -> (NaiveDate, u8, &str) {
        (self.date, self.period_index, self.area.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(period_index: u8) -> PriceRecord {
        PriceRecord {
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            period_index,
            area: "System".into(),
            price: Decimal::from_str("10.5").unwrap(),
        }
    }

    #[test]
    fn test_period_start_and_label() {
        assert_eq!(record(1).time_label(), "00:00");
        assert_eq!(record(2).time_label(), "00:30");
        assert_eq!(record(27).time_label(), "13:00");
        assert_eq!(record(48).time_label(), "23:30");
        assert_eq!(record(48).start().date(), record(48).date);
    }

    #[test]
    fn test_period_bounds() {
        assert!(!PriceRecord::is_valid_period(0));
        assert!(PriceRecord::is_valid_period(1));
        assert!(PriceRecord::is_valid_period(48));
        assert!(!PriceRecord::is_valid_period(49));
    }
}
