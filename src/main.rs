use std::process::ExitCode;

use anyhow::{Context, Result};
use jepxscraper::{
    config::Settings,
    error::IngestError,
    pipeline::{self, today_jst, IngestContext},
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// One ingestion run, meant to be started by an external scheduler.
/// Exit code 0 on success; see `IngestError::exit_code` otherwise.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    match try_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<IngestError>()
                .map_or(1, IngestError::exit_code);
            match err.downcast_ref::<IngestError>() {
                Some(IngestError::SchemaDrift(_)) => {
                    error!(code, "publisher changed its table format: {:#}", err)
                }
                _ => error!(code, "run failed: {:#}", err),
            }
            ExitCode::from(code)
        }
    }
}

async fn try_main() -> Result<()> {
    // ─── 2) settings + context ───────────────────────────────────────
    let settings = Settings::load().context("loading settings")?;
    info!(
        data_dir = %settings.data_dir.display(),
        registry = %settings.registry.version,
        "settings loaded"
    );
    let ctx = IngestContext::new(settings, today_jst())?;

    // ─── 3) run ──────────────────────────────────────────────────────
    let report = pipeline::run(&ctx).await?;
    info!(
        year = %report.current,
        path = %report.written.path.display(),
        rows = report.written.rows,
        defects = %report.defects,
        "all done"
    );
    Ok(())
}
