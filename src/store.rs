// src/store.rs

use std::{
    collections::BTreeSet,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::NaiveDate;
use glob::{glob, Pattern};
use regex::Regex;
use rust_decimal::Decimal;
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};

use crate::error::IngestError;
use crate::fiscal::FiscalYear;
use crate::process::PriceRecord;

pub const COLUMNS: [&str; 4] = ["date", "period_index", "area", "price"];

/// What one write committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub path: PathBuf,
    pub rows: usize,
    /// Records dated outside the fiscal year, not written.
    pub outside: usize,
    /// Records sharing a (date, period, area) key with an earlier one, not written.
    pub duplicates: usize,
}

/// One CSV file per fiscal year under a single directory, named
/// `<prefix><year>.csv`. Sole writer of those files.
#[derive(Debug, Clone)]
pub struct FiscalYearStore {
    dir: PathBuf,
    prefix: String,
    name_re: Regex,
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

impl FiscalYearStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str) -> Result<Self, IngestError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| IngestError::persistence(&dir, e))?;
        let name_re = Regex::new(&format!(r"^{}(\d{{4}})\.csv$", regex::escape(prefix)))
            .map_err(|e| IngestError::persistence(&dir, invalid_data(e.to_string())))?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            name_re,
        })
    }

    pub fn path_for(&self, year: FiscalYear) -> PathBuf {
        self.dir.join(format!("{}{}.csv", self.prefix, year.year()))
    }

    pub fn exists(&self, year: FiscalYear) -> bool {
        self.path_for(year).is_file()
    }

    /// Years present on disk, discovered from file names.
    pub fn list_years(&self) -> Result<BTreeSet<FiscalYear>, IngestError> {
        let pattern = format!(
            "{}/{}*.csv",
            Pattern::escape(&self.dir.display().to_string()),
            Pattern::escape(&self.prefix)
        );
        let entries =
            glob(&pattern).map_err(|e| IngestError::persistence(&self.dir, invalid_data(e.to_string())))?;

        let mut years = BTreeSet::new();
        for entry in entries {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("cannot read glob entry: {:?}", e);
                    continue;
                }
            };
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(year) = self
                .name_re
                .captures(name)
                .and_then(|caps| caps[1].parse().ok())
            {
                years.insert(FiscalYear(year));
            }
        }
        Ok(years)
    }

    /// Replace the file for `year` with `records`, sorted by date, period and area.
    ///
    /// The rows are written to a temp file in the same directory, fsynced and
    /// renamed over the target, so the named file is either the old one or
    /// the complete new one.
    #[instrument(level = "info", skip(self, records), fields(records = records.len()))]
    pub fn write(&self, year: FiscalYear, records: &[PriceRecord]) -> Result<WriteReport, IngestError> {
        let path = self.path_for(year);
        let (bytes, mut report) =
            render(year, records).map_err(|e| IngestError::persistence(&path, e))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| IngestError::persistence(&self.dir, e))?;
        tmp.write_all(&bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| IngestError::persistence(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| IngestError::persistence(&path, e.error))?;

        if report.outside > 0 {
            warn!(%year, outside = report.outside, "dropped records outside the fiscal year");
        }
        if report.duplicates > 0 {
            warn!(%year, duplicates = report.duplicates, "dropped duplicate (date, period, area) records");
        }
        info!(%year, rows = report.rows, path = %path.display(), "wrote fiscal year file");

        report.path = path;
        Ok(report)
    }

    pub fn read(&self, year: FiscalYear) -> Result<Vec<PriceRecord>, IngestError> {
        let path = self.path_for(year);
        read_file(&path).map_err(|e| IngestError::persistence(&path, e))
    }

    /// Every stored year concatenated, in year order.
    pub fn load_all(&self) -> Result<Vec<PriceRecord>, IngestError> {
        let mut all = Vec::new();
        for year in self.list_years()? {
            all.extend(self.read(year)?);
        }
        Ok(all)
    }
}

/// Canonical CSV bytes for one fiscal year. Identical record sets give
/// identical bytes whatever their input order.
fn render(year: FiscalYear, records: &[PriceRecord]) -> io::Result<(Vec<u8>, WriteReport)> {
    let mut rows: Vec<&PriceRecord> = records.iter().filter(|r| year.contains(r.date)).collect();
    let outside = records.len() - rows.len();

    // full Ord includes price, so the kept duplicate does not depend on input order
    rows.sort();
    let before = rows.len();
    rows.dedup_by(|later, kept| later.key() == kept.key());
    let duplicates = before - rows.len();

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(COLUMNS)?;
    for r in &rows {
        wtr.write_record([
            r.date.format("%Y-%m-%d").to_string(),
            r.period_index.to_string(),
            r.area.clone(),
            r.price.normalize().to_string(),
        ])?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;

    Ok((
        bytes,
        WriteReport {
            path: PathBuf::new(),
            rows: rows.len(),
            outside,
            duplicates,
        },
    ))
}

fn read_file(path: &Path) -> io::Result<Vec<PriceRecord>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    if headers.iter().ne(COLUMNS) {
        return Err(invalid_data(format!("unexpected columns {:?}", headers)));
    }

    let mut out = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let bad = |what: &str| invalid_data(format!("bad {} on data line {}", what, line + 1));
        let date = NaiveDate::parse_from_str(&record[0], "%Y-%m-%d").map_err(|_| bad("date"))?;
        let period_index: u8 = record[1].parse().map_err(|_| bad("period_index"))?;
        let price = Decimal::from_str(&record[3]).map_err(|_| bad("price"))?;
        out.push(PriceRecord {
            date,
            period_index,
            area: record[2].to_string(),
            price,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn rec(date: &str, period: u8, area: &str, price: &str) -> PriceRecord {
        PriceRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            period_index: period,
            area: area.to_string(),
            price: Decimal::from_str(price).unwrap(),
        }
    }

    fn sample() -> Vec<PriceRecord> {
        vec![
            rec("2025-04-02", 1, "Tokyo", "9.5"),
            rec("2025-04-01", 2, "Tokyo", "11.0"),
            rec("2025-04-01", 1, "Tokyo", "10.5"),
            rec("2025-04-01", 1, "Osaka", "12.00"),
            rec("2025-04-01", 2, "Osaka", "12.5"),
        ]
    }

    #[test]
    fn test_write_is_sorted_and_canonical() -> Result<()> {
        let dir = tempdir()?;
        let store = FiscalYearStore::new(dir.path(), "spot_")?;
        let report = store.write(FiscalYear(2025), &sample())?;

        assert_eq!(report.rows, 5);
        assert_eq!(report.path, dir.path().join("spot_2025.csv"));
        let text = fs::read_to_string(&report.path)?;
        assert_eq!(
            text,
            "date,period_index,area,price\n\
             2025-04-01,1,Osaka,12\n\
             2025-04-01,1,Tokyo,10.5\n\
             2025-04-01,2,Osaka,12.5\n\
             2025-04-01,2,Tokyo,11\n\
             2025-04-02,1,Tokyo,9.5\n"
        );
        Ok(())
    }

    #[test]
    fn test_output_independent_of_input_order() -> Result<()> {
        let a = tempdir()?;
        let b = tempdir()?;
        let mut reversed = sample();
        reversed.reverse();
        // a duplicate key with a different price, placed differently in each input
        let mut first = sample();
        first.push(rec("2025-04-01", 1, "Tokyo", "99"));
        reversed.insert(0, rec("2025-04-01", 1, "Tokyo", "99"));

        let pa = FiscalYearStore::new(a.path(), "spot_")?.write(FiscalYear(2025), &first)?;
        let pb = FiscalYearStore::new(b.path(), "spot_")?.write(FiscalYear(2025), &reversed)?;

        assert_eq!(pa.duplicates, 1);
        assert_eq!(fs::read(&pa.path)?, fs::read(&pb.path)?);
        Ok(())
    }

    #[test]
    fn test_rewrite_replaces_previous_file() -> Result<()> {
        let dir = tempdir()?;
        let store = FiscalYearStore::new(dir.path(), "spot_")?;
        store.write(FiscalYear(2025), &sample())?;
        store.write(FiscalYear(2025), &[rec("2025-04-01", 1, "Tokyo", "8.25")])?;

        let back = store.read(FiscalYear(2025))?;
        assert_eq!(back, vec![rec("2025-04-01", 1, "Tokyo", "8.25")]);
        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_records_outside_year_are_dropped() -> Result<()> {
        let dir = tempdir()?;
        let store = FiscalYearStore::new(dir.path(), "spot_")?;
        let mut records = sample();
        records.push(rec("2025-03-31", 48, "Tokyo", "7"));
        records.push(rec("2026-04-01", 1, "Tokyo", "7"));

        let report = store.write(FiscalYear(2025), &records)?;
        assert_eq!(report.outside, 2);
        assert_eq!(report.rows, 5);
        Ok(())
    }

    #[test]
    fn test_list_years_and_load_all() -> Result<()> {
        let dir = tempdir()?;
        let store = FiscalYearStore::new(dir.path(), "spot_")?;
        store.write(FiscalYear(2025), &sample())?;
        store.write(FiscalYear(2010), &[rec("2010-04-01", 1, "System", "10")])?;
        fs::write(dir.path().join("history_2010_2024.csv"), "x")?;
        fs::write(dir.path().join("spot_latest.csv"), "x")?;

        let years: Vec<_> = store.list_years()?.into_iter().collect();
        assert_eq!(years, vec![FiscalYear(2010), FiscalYear(2025)]);
        assert!(store.exists(FiscalYear(2010)));
        assert!(!store.exists(FiscalYear(2011)));

        let all = store.load_all()?;
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].area, "System");
        Ok(())
    }
}
