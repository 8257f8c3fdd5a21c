// src/fetch/mod.rs

pub mod client;
pub mod encoding;
pub mod source;
pub mod validate;

pub use client::{AttemptOutcome, FetchAttempt, Fetched, Payload, Transport};
pub use source::{resolve_all, Source, SourceTemplate};
pub use validate::validate_payload;
