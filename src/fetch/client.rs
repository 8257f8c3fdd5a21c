// src/fetch/client.rs

use std::time::Duration;

use encoding_rs::Encoding;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, REFERER},
    Client, RequestBuilder,
};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use super::encoding::{charset_from_content_type, decode};
use super::source::Source;
use super::validate::validate_payload;
use crate::config::{ConfigError, TransportConfig};
use crate::error::IngestError;

/// Ceiling for the delay between tries on one source.
const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Rejected(String),
    TransportError(String),
    HttpError,
}

/// One try against one candidate source. Logged, never persisted.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub source: String,
    pub try_no: u32,
    pub status: Option<u16>,
    pub size: Option<usize>,
    pub outcome: AttemptOutcome,
}

/// A payload the validator accepted.
#[derive(Debug, Clone)]
pub struct Payload {
    pub source: String,
    pub bytes: Vec<u8>,
    /// Charset declared by the server, if any.
    pub charset: Option<String>,
}

impl Payload {
    pub fn text(&self, default: &'static Encoding) -> String {
        decode(&self.bytes, self.charset.as_deref(), default)
    }
}

#[derive(Debug)]
pub struct Fetched {
    pub payload: Payload,
    pub attempts: Vec<FetchAttempt>,
}

pub struct Transport {
    client: Client,
    cfg: TransportConfig,
}

impl Transport {
    pub fn new(cfg: TransportConfig) -> Result<Self, IngestError> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = &cfg.referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|e| ConfigError::Invalid(format!("bad referer `{}`: {}", referer, e)))?;
            headers.insert(REFERER, value);
        }
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("building HTTP client: {}", e)))?;
        Ok(Self { client, cfg })
    }

    /// Try each candidate in order until one yields an accepted payload.
    /// Per-attempt failures are logged; only exhaustion is an error.
    #[instrument(level = "info", skip(self, sources), fields(candidates = sources.len()))]
    pub async fn fetch_first_valid(
        &self,
        target: &str,
        sources: &[Source],
    ) -> Result<Fetched, IngestError> {
        let mut attempts = Vec::new();

        for source in sources {
            let mut try_no = 0;
            loop {
                try_no += 1;
                let (attempt, result) = self.attempt(source, try_no).await;
                attempts.push(attempt);

                match result {
                    Ok(payload) => return Ok(Fetched { payload, attempts }),
                    Err(e) if e.is_retryable() && try_no <= self.cfg.retries_per_source => {
                        let backoff = backoff_ms(self.cfg.retry_backoff_ms, try_no);
                        warn!(source = %source, attempt = try_no, delay_ms = backoff, error = %e, "Retrying");
                        sleep(Duration::from_millis(backoff)).await;
                    }
                    Err(e) => {
                        warn!(source = %source, error = %e, "candidate failed");
                        break;
                    }
                }
            }
        }

        Err(IngestError::SourcesExhausted {
            target: target.to_string(),
            attempts,
        })
    }

    async fn attempt(
        &self,
        source: &Source,
        try_no: u32,
    ) -> (FetchAttempt, Result<Payload, IngestError>) {
        let label = source.to_string();
        let mut attempt = FetchAttempt {
            source: label.clone(),
            try_no,
            status: None,
            size: None,
            outcome: AttemptOutcome::Success,
        };

        let fetched = match source {
            Source::Get { url } => self.send(self.client.get(url), url, &mut attempt).await,
            Source::Post { url, form } => {
                self.send(self.client.post(url).form(form), url, &mut attempt)
                    .await
            }
            Source::File { path } => tokio::fs::read(path)
                .await
                .map(|bytes| (bytes, None))
                .map_err(|e| IngestError::Transport {
                    url: label.clone(),
                    message: e.to_string(),
                }),
        };

        let result = fetched.and_then(|(bytes, charset)| {
            attempt.size = Some(bytes.len());
            validate_payload(&bytes, self.cfg.min_payload_bytes)
                .map_err(|reason| IngestError::InvalidPayload {
                    url: label.clone(),
                    reason,
                })
                .map(|()| Payload {
                    source: label.clone(),
                    bytes,
                    charset,
                })
        });

        attempt.outcome = match &result {
            Ok(_) => AttemptOutcome::Success,
            Err(IngestError::InvalidPayload { reason, .. }) => {
                AttemptOutcome::Rejected(reason.clone())
            }
            Err(IngestError::Http { .. }) => AttemptOutcome::HttpError,
            Err(e) => AttemptOutcome::TransportError(e.to_string()),
        };
        info!(
            source = %attempt.source,
            try_no = attempt.try_no,
            status = ?attempt.status,
            size = ?attempt.size,
            outcome = ?attempt.outcome,
            "fetch attempt"
        );

        (attempt, result)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        attempt: &mut FetchAttempt,
    ) -> Result<(Vec<u8>, Option<String>), IngestError> {
        let transport = |e: reqwest::Error| IngestError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let resp = request.send().await.map_err(transport)?;
        let status = resp.status();
        attempt.status = Some(status.as_u16());
        if !status.is_success() {
            return Err(IngestError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let charset = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        let bytes = resp.bytes().await.map_err(transport)?;
        Ok((bytes.to_vec(), charset))
    }
}

/// `base * 2^(try_no - 1)`, saturating at `MAX_BACKOFF_MS`.
fn backoff_ms(base: u64, try_no: u32) -> u64 {
    2u64.checked_pow(try_no.saturating_sub(1))
        .map_or(MAX_BACKOFF_MS, |factor| base.saturating_mul(factor))
        .min(MAX_BACKOFF_MS)
}
