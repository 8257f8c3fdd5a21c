// src/fetch/encoding.rs

use encoding_rs::{Encoding, SHIFT_JIS};
use tracing::{debug, warn};

/// Pull `charset=...` out of a Content-Type header value.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve a configured label; unknown labels fall back to Shift_JIS.
pub fn encoding_for_label(label: &str) -> &'static Encoding {
    Encoding::for_label(label.as_bytes()).unwrap_or(SHIFT_JIS)
}

/// Decode a payload: BOM first, then the declared charset, then `default`.
/// A declared charset that yields malformed sequences is dropped in favour of `default`.
pub fn decode(bytes: &[u8], declared: Option<&str>, default: &'static Encoding) -> String {
    if let Some((enc, bom_len)) = Encoding::for_bom(bytes) {
        debug!(encoding = enc.name(), "decoding by BOM");
        let (text, _) = enc.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Some(enc) = declared.and_then(|l| Encoding::for_label(l.as_bytes())) {
        let (text, had_errors) = enc.decode_without_bom_handling(bytes);
        if !had_errors || enc == default {
            return text.into_owned();
        }
        warn!(
            declared = enc.name(),
            fallback = default.name(),
            "declared charset does not fit the payload"
        );
    }

    let (text, had_errors) = default.decode_without_bom_handling(bytes);
    if had_errors {
        warn!(encoding = default.name(), "payload contains malformed sequences");
    }
    text.into_owned()
}
