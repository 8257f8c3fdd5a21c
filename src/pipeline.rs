// src/pipeline.rs

use chrono::{FixedOffset, NaiveDate, Utc};
use encoding_rs::Encoding;
use tracing::{info, instrument, warn};

use crate::archive::{split_archive, SplitReport};
use crate::config::Settings;
use crate::error::IngestError;
use crate::fetch::{encoding::encoding_for_label, resolve_all, Source, Transport};
use crate::fiscal::{historical_years, FiscalYear};
use crate::process::{reshape, DefectCounts, RawTable, Reshaped};
use crate::schema::detect_columns;
use crate::store::{FiscalYearStore, WriteReport};

const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Today's date in Japan, where the fiscal calendar is kept.
pub fn today_jst() -> NaiveDate {
    let offset = FixedOffset::east_opt(JST_OFFSET_SECS).expect("+09:00 is a valid offset");
    Utc::now().with_timezone(&offset).date_naive()
}

/// Everything one run needs, owned by the caller and passed down explicitly.
pub struct IngestContext {
    pub settings: Settings,
    pub transport: Transport,
    pub store: FiscalYearStore,
    /// Reference date deciding which fiscal year is current.
    pub today: NaiveDate,
}

impl IngestContext {
    pub fn new(settings: Settings, today: NaiveDate) -> Result<Self, IngestError> {
        let transport = Transport::new(settings.transport.clone())?;
        let store = FiscalYearStore::new(&settings.data_dir, &settings.file_prefix)?;
        Ok(Self {
            settings,
            transport,
            store,
            today,
        })
    }

    fn default_encoding(&self) -> &'static Encoding {
        encoding_for_label(&self.settings.transport.default_encoding)
    }
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub missing: Vec<FiscalYear>,
    pub split: Option<SplitReport>,
    /// Years captured by a per-year fetch after the archive split.
    pub fetched: Vec<FiscalYear>,
    pub failed: Vec<(FiscalYear, String)>,
}

#[derive(Debug)]
pub struct RunReport {
    pub current: FiscalYear,
    pub written: WriteReport,
    pub defects: DefectCounts,
    pub backfill: BackfillReport,
}

/// Fetch, validate, detect and reshape the first acceptable candidate.
#[instrument(level = "info", skip(ctx, sources))]
pub async fn fetch_records(
    ctx: &IngestContext,
    target: &str,
    sources: &[Source],
) -> Result<Reshaped, IngestError> {
    let fetched = ctx.transport.fetch_first_valid(target, sources).await?;
    let payload = fetched.payload;
    let text = payload.text(ctx.default_encoding());
    let table = RawTable::parse(&text, &payload.source)?;
    info!(source = %payload.source, rows = table.rows.len(), "parsed table");

    let mapping = detect_columns(&table, &ctx.settings.registry)?;
    Ok(reshape(&table, &mapping))
}

/// Rebuild the current fiscal year's file from the latest publication.
/// Any failure leaves the previous file in place.
#[instrument(level = "info", skip(ctx))]
pub async fn ingest_current(
    ctx: &IngestContext,
    year: FiscalYear,
) -> Result<(WriteReport, DefectCounts), IngestError> {
    let sources = resolve_all(&ctx.settings.current, year.year());
    let reshaped = fetch_records(ctx, &year.to_string(), &sources).await?;

    if !reshaped.records.iter().any(|r| year.contains(r.date)) {
        return Err(IngestError::NoRecords {
            target: year.to_string(),
        });
    }
    let written = ctx.store.write(year, &reshaped.records)?;
    Ok((written, reshaped.defects))
}

/// Capture historical years that have no file yet. Never fails the run:
/// every problem is logged and reported.
#[instrument(level = "info", skip(ctx))]
pub async fn backfill_historical(ctx: &IngestContext) -> BackfillReport {
    let settings = &ctx.settings;
    let years = historical_years(ctx.today, settings.floor_year);
    let mut report = BackfillReport {
        missing: years.iter().copied().filter(|y| !ctx.store.exists(*y)).collect(),
        ..Default::default()
    };
    if report.missing.is_empty() {
        info!(years = years.len(), "historical years complete");
        return report;
    }
    info!(missing = report.missing.len(), "historical years to capture");

    if !settings.archive.is_empty() {
        let current = FiscalYear::of(ctx.today);
        let sources = resolve_all(&settings.archive, current.year());
        match fetch_records(ctx, "history archive", &sources).await {
            Ok(reshaped) => {
                report.split = Some(split_archive(&reshaped.records, &years, &ctx.store));
            }
            Err(e) => warn!(error = %e, "history archive unavailable"),
        }
    }

    if settings.backfill_years {
        for &year in &report.missing {
            if ctx.store.exists(year) {
                continue;
            }
            let sources = resolve_all(&settings.current, year.year());
            let outcome = match fetch_records(ctx, &year.to_string(), &sources).await {
                Ok(reshaped) => split_archive(&reshaped.records, &[year], &ctx.store),
                Err(e) => {
                    warn!(%year, error = %e, "historical year unavailable");
                    report.failed.push((year, e.to_string()));
                    continue;
                }
            };
            if outcome.written.contains(&year) {
                report.fetched.push(year);
            } else if let Some((_, msg)) = outcome.failed.into_iter().next() {
                report.failed.push((year, msg));
            } else {
                report.failed.push((year, "no records in fiscal year".to_string()));
            }
        }
    }

    report
}

/// One complete ingestion run: backfill what is missing, then rebuild the
/// current fiscal year. Only the current year can fail the run.
pub async fn run(ctx: &IngestContext) -> Result<RunReport, IngestError> {
    let current = FiscalYear::of(ctx.today);
    info!(today = %ctx.today, %current, "ingestion run");

    let backfill = backfill_historical(ctx).await;
    let (written, defects) = ingest_current(ctx, current).await?;

    info!(
        %current,
        rows = written.rows,
        rejected_cells = defects.total(),
        backfilled = backfill.split.as_ref().map_or(0, |s| s.written.len()) + backfill.fetched.len(),
        still_missing = backfill.failed.len(),
        "run complete"
    );
    Ok(RunReport {
        current,
        written,
        defects,
        backfill,
    })
}
