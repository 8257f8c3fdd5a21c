// src/archive.rs

use std::collections::BTreeMap;

use tracing::{error, info, instrument, warn};

use crate::fiscal::FiscalYear;
use crate::process::PriceRecord;
use crate::store::FiscalYearStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub written: Vec<FiscalYear>,
    /// Already on disk; left untouched.
    pub already_present: Vec<FiscalYear>,
    /// No archive records fell in the year; nothing written.
    pub empty: Vec<FiscalYear>,
    pub failed: Vec<(FiscalYear, String)>,
}

impl SplitReport {
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.failed.is_empty()
    }
}

/// Split a consolidated multi-year archive into one file per historical year.
///
/// Years whose file already exists are never re-derived: a later archive that
/// is truncated must not overwrite data captured earlier. A failing year is
/// logged and the remaining years are still processed.
#[instrument(level = "info", skip_all, fields(records = records.len(), years = years.len()))]
pub fn split_archive(
    records: &[PriceRecord],
    years: &[FiscalYear],
    store: &FiscalYearStore,
) -> SplitReport {
    let mut report = SplitReport::default();

    let mut wanted: BTreeMap<FiscalYear, Vec<PriceRecord>> = BTreeMap::new();
    for &year in years {
        if store.exists(year) {
            report.already_present.push(year);
        } else {
            wanted.insert(year, Vec::new());
        }
    }
    if wanted.is_empty() {
        info!("all historical years already materialized");
        return report;
    }

    for r in records {
        if let Some(bucket) = wanted.get_mut(&FiscalYear::of(r.date)) {
            bucket.push(r.clone());
        }
    }

    for (year, bucket) in wanted {
        if bucket.is_empty() {
            warn!(%year, "archive has no records for year");
            report.empty.push(year);
            continue;
        }
        match store.write(year, &bucket) {
            Ok(w) => {
                info!(%year, rows = w.rows, "historical year captured");
                report.written.push(year);
            }
            Err(e) => {
                error!(%year, error = %e, "failed to write historical year");
                report.failed.push((year, e.to_string()));
            }
        }
    }

    report
}
