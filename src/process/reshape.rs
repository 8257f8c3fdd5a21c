use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use tracing::{info, instrument, warn};

use super::date_parser::parse_date;
use super::raw_table::RawTable;
use super::record::PriceRecord;
use crate::schema::AreaColumnMapping;

/// Why a single (row, area) cell was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectKind {
    BadDate,
    BadPeriod,
    PeriodOutOfRange,
    MissingPrice,
    NonNumericPrice,
}

/// Per-kind counts of dropped (row, area) cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefectCounts {
    pub bad_date: u64,
    pub bad_period: u64,
    pub period_out_of_range: u64,
    pub missing_price: u64,
    pub non_numeric_price: u64,
}

impl DefectCounts {
    pub fn record(&mut self, kind: DefectKind, cells: u64) {
        let slot = match kind {
            DefectKind::BadDate => &mut self.bad_date,
            DefectKind::BadPeriod => &mut self.bad_period,
            DefectKind::PeriodOutOfRange => &mut self.period_out_of_range,
            DefectKind::MissingPrice => &mut self.missing_price,
            DefectKind::NonNumericPrice => &mut self.non_numeric_price,
        };
        *slot = slot.saturating_add(cells);
    }

    pub fn total(&self) -> u64 {
        self.bad_date
            + self.bad_period
            + self.period_out_of_range
            + self.missing_price
            + self.non_numeric_price
    }
}

impl fmt::Display for DefectCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bad_date={} bad_period={} period_out_of_range={} missing_price={} non_numeric_price={}",
            self.bad_date,
            self.bad_period,
            self.period_out_of_range,
            self.missing_price,
            self.non_numeric_price
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reshaped {
    pub records: Vec<PriceRecord>,
    pub defects: DefectCounts,
}

/// Parse a price cell. Thousands separators are accepted; blanks are not prices.
pub fn parse_price(cell: &str) -> Option<Decimal> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
        .map(|d| d.normalize())
}

/// Integer period index. `"1.0"` style cells from spreadsheet exports are accepted.
fn parse_period(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if let Ok(p) = cell.parse::<i64>() {
        return Some(p);
    }
    let d = Decimal::from_str(cell).ok()?;
    if !d.fract().is_zero() {
        return None;
    }
    d.to_i64()
}

/// Turn a wide table into long-format records, one per row per mapped area.
///
/// Bad cells are dropped for that (row, area) pair only and counted. A bad
/// date or period drops every area of that row.
#[instrument(level = "info", skip_all, fields(rows = table.rows.len(), areas = mapping.areas.len()))]
pub fn reshape(table: &RawTable, mapping: &AreaColumnMapping) -> Reshaped {
    let mut out = Reshaped {
        records: Vec::with_capacity(table.rows.len() * mapping.areas.len()),
        defects: DefectCounts::default(),
    };
    let area_cells = mapping.areas.len() as u64;

    for row in 0..table.rows.len() {
        let line = row + 2; // 1-based, after the header

        let Some(date) = table.cell(row, mapping.date_col).and_then(parse_date) else {
            warn!(line, value = ?table.cell(row, mapping.date_col), "unparsable date; row dropped");
            out.defects.record(DefectKind::BadDate, area_cells);
            continue;
        };

        let period = match table.cell(row, mapping.period_col).and_then(parse_period) {
            Some(p) => p,
            None => {
                warn!(line, value = ?table.cell(row, mapping.period_col), "unparsable period index; row dropped");
                out.defects.record(DefectKind::BadPeriod, area_cells);
                continue;
            }
        };
        let period_index = match u8::try_from(period) {
            Ok(p) if PriceRecord::is_valid_period(p) => p,
            _ => {
                warn!(line, period, %date, "period index outside 1..=48; row dropped");
                out.defects.record(DefectKind::PeriodOutOfRange, area_cells);
                continue;
            }
        };

        for col in &mapping.areas {
            let cell = table.cell(row, col.index).unwrap_or("");
            if cell.is_empty() {
                out.defects.record(DefectKind::MissingPrice, 1);
                continue;
            }
            match parse_price(cell) {
                Some(price) => out.records.push(PriceRecord {
                    date,
                    period_index,
                    area: col.area.clone(),
                    price,
                }),
                None => out.defects.record(DefectKind::NonNumericPrice, 1),
            }
        }
    }

    info!(
        records = out.records.len(),
        rejected = out.defects.total(),
        defects = %out.defects,
        "reshaped"
    );
    out
}
