// src/fetch/validate.rs

use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// How much of the payload is sniffed for markup.
const SNIFF_BYTES: usize = 8 * 1024;

static MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<!doctype\s+html|<html[\s>]").expect("markup pattern should compile")
});

/// Decide whether a payload may be trusted as tabular data.
/// Returns the rejection reason otherwise.
pub fn validate_payload(bytes: &[u8], min_bytes: usize) -> Result<(), String> {
    if bytes.is_empty() {
        return Err("empty response".to_string());
    }
    if bytes.len() < min_bytes {
        return Err(format!(
            "payload is {} bytes, below the {} byte minimum",
            bytes.len(),
            min_bytes
        ));
    }
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];
    if let Some(m) = MARKUP.find(head) {
        return Err(format!(
            "payload is markup ({}...), not delimited text",
            String::from_utf8_lossy(m.as_bytes())
        ));
    }
    Ok(())
}
