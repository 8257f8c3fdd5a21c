//! Connection check: try the current fiscal year's candidates, print every
//! attempt and a preview of the accepted payload. Writes nothing.

use std::process::ExitCode;

use anyhow::Result;
use jepxscraper::{
    config::Settings,
    error::IngestError,
    fetch::{encoding::encoding_for_label, resolve_all, FetchAttempt, Transport},
    fiscal::FiscalYear,
    pipeline::today_jst,
};
use tracing_subscriber::{fmt, EnvFilter};

const PREVIEW_CHARS: usize = 100;

fn print_attempts(attempts: &[FetchAttempt]) {
    for a in attempts {
        println!(
            "  #{} {} status={} size={} -> {:?}",
            a.try_no,
            a.source,
            a.status.map_or("-".to_string(), |s| s.to_string()),
            a.size.map_or("-".to_string(), |s| s.to_string()),
            a.outcome
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let settings = Settings::load()?;
    let year = FiscalYear::of(today_jst());
    let sources = resolve_all(&settings.current, year.year());
    let default_encoding = encoding_for_label(&settings.transport.default_encoding);
    let transport = Transport::new(settings.transport)?;

    println!("--- JEPX connection test: {} ({} candidates) ---", year, sources.len());
    match transport.fetch_first_valid(&year.to_string(), &sources).await {
        Ok(fetched) => {
            print_attempts(&fetched.attempts);
            let payload = fetched.payload;
            println!("accepted {} ({} bytes)", payload.source, payload.bytes.len());
            let preview: String = payload.text(default_encoding).chars().take(PREVIEW_CHARS).collect();
            println!("--- preview ---\n{}", preview);
            Ok(ExitCode::SUCCESS)
        }
        Err(IngestError::SourcesExhausted { attempts, .. }) => {
            print_attempts(&attempts);
            println!("no candidate produced a usable payload");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
