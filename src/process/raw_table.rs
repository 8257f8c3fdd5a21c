use csv::{ReaderBuilder, Trim};

use crate::error::IngestError;

/// A publisher table exactly as served: wide, one column per area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Header cells, trimmed. Wording varies from release to release.
    pub headers: Vec<String>,
    /// Data rows, trimmed. Rows may be shorter than `headers`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Parse decoded delimited text. The first non-blank line is the header.
    pub fn parse(text: &str, origin: &str) -> Result<Self, IngestError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let invalid = |e: csv::Error| IngestError::InvalidPayload {
            url: origin.to_string(),
            reason: format!("unreadable table: {}", e),
        };

        let headers: Vec<String> = rdr
            .headers()
            .map_err(invalid)?
            .iter()
            .map(|h| h.trim_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(invalid)?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(RawTable { headers, rows })
    }

    /// Cell at `(row, col)`, `None` when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
    }
}
