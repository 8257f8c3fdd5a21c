// src/schema/detect.rs

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use super::registry::KeywordRegistry;
use crate::error::IngestError;
use crate::process::reshape::parse_price;
use crate::process::RawTable;

/// A raw header resolved to a canonical area id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaColumn {
    pub index: usize,
    pub header: String,
    pub area: String,
}

/// Where the semantic columns of one RawTable live. Built per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaColumnMapping {
    pub date_col: usize,
    pub period_col: usize,
    /// In registry order; never empty.
    pub areas: Vec<AreaColumn>,
}

/// First unclaimed header (in column order) containing any of `keywords`.
fn find_header(headers: &[String], keywords: &[String], claimed: &HashSet<usize>) -> Option<usize> {
    headers.iter().enumerate().find_map(|(i, h)| {
        (!claimed.contains(&i) && keywords.iter().any(|k| h.contains(k.as_str()))).then_some(i)
    })
}

/// A column is numeric when at least one non-empty cell parses as a price.
/// Empty tables give no evidence either way and are accepted.
fn is_numeric_column(table: &RawTable, col: usize) -> bool {
    let mut seen_value = false;
    for row in 0..table.rows.len() {
        match table.cell(row, col) {
            Some(v) if !v.is_empty() => {
                if parse_price(v).is_some() {
                    return true;
                }
                seen_value = true;
            }
            _ => {}
        }
    }
    !seen_value
}

/// Map the table's headers to date, period and area roles by keyword substring.
///
/// Roles are claimed in order date, period, then areas in registry order; a
/// header serves at most one role. A missing date or period column, or no area
/// column at all, is schema drift.
#[instrument(level = "info", skip_all, fields(registry = %registry.version, columns = table.headers.len()))]
pub fn detect_columns(
    table: &RawTable,
    registry: &KeywordRegistry,
) -> Result<AreaColumnMapping, IngestError> {
    let headers = &table.headers;
    let mut claimed = HashSet::new();

    let date_col = find_header(headers, &registry.date, &claimed).ok_or_else(|| {
        IngestError::SchemaDrift(format!(
            "no date column (keywords {:?}) in headers {:?}",
            registry.date, headers
        ))
    })?;
    claimed.insert(date_col);

    let period_col = find_header(headers, &registry.period, &claimed).ok_or_else(|| {
        IngestError::SchemaDrift(format!(
            "no period column (keywords {:?}) in headers {:?}",
            registry.period, headers
        ))
    })?;
    claimed.insert(period_col);

    let mut areas: Vec<AreaColumn> = Vec::new();
    let mut unmapped = Vec::new();
    for entry in &registry.areas {
        if areas.iter().any(|a| a.area == entry.area) {
            continue;
        }
        let hit = headers.iter().enumerate().find(|(i, h)| {
            if claimed.contains(i) || !h.contains(entry.keyword.as_str()) {
                return false;
            }
            if is_numeric_column(table, *i) {
                return true;
            }
            warn!(header = %h, area = %entry.area, "keyword matched a non-numeric column; skipping");
            false
        });
        match hit {
            Some((i, h)) => {
                debug!(header = %h, area = %entry.area, "mapped area column");
                claimed.insert(i);
                areas.push(AreaColumn {
                    index: i,
                    header: h.clone(),
                    area: entry.area.clone(),
                });
            }
            None => unmapped.push(entry.keyword.as_str()),
        }
    }

    if areas.is_empty() {
        return Err(IngestError::SchemaDrift(format!(
            "no area columns matched registry {} in headers {:?}",
            registry.version, headers
        )));
    }

    info!(
        date = %headers[date_col],
        period = %headers[period_col],
        areas = areas.len(),
        "detected columns"
    );
    if !unmapped.is_empty() {
        debug!(?unmapped, "registry keywords without a column");
    }

    Ok(AreaColumnMapping {
        date_col,
        period_col,
        areas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::schema::registry::AreaKeyword;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn simple_registry() -> KeywordRegistry {
        KeywordRegistry {
            version: "test".into(),
            date: vec!["date".into()],
            period: vec!["period_index".into()],
            areas: vec![
                AreaKeyword { keyword: "Tokyo".into(), area: "Tokyo".into() },
                AreaKeyword { keyword: "Osaka".into(), area: "Osaka".into() },
            ],
        }
    }

    #[test]
    fn test_substring_match_tolerates_unit_suffix() {
        let t = table(
            &["date", "period_index", "Tokyo (JPY/kWh)", "[Osaka] price"],
            &[&["2025/04/01", "1", "10.5", "12.0"]],
        );
        let m = detect_columns(&t, &simple_registry()).unwrap();
        assert_eq!(m.date_col, 0);
        assert_eq!(m.period_col, 1);
        assert_eq!(m.areas.len(), 2);
        assert_eq!(m.areas[0].area, "Tokyo");
        assert_eq!(m.areas[0].index, 2);
        assert_eq!(m.areas[1].header, "[Osaka] price");
    }

    #[test]
    fn test_publisher_headers_with_builtin_registry() {
        let registry = Settings::builtin().unwrap().registry;
        let t = table(
            &[
                "受渡日",
                "時刻コード",
                "売り入札量(kWh)",
                "システムプライス(円/kWh)",
                "エリアプライス北海道(円/kWh)",
                "エリアプライス東京(円/kWh)",
                "回避可能原価東京(円/kWh)",
            ],
            &[&["2025/04/01", "1", "1000", "10.5", "11.0", "12.0", "9.0"]],
        );
        let m = detect_columns(&t, &registry).unwrap();
        let mapped: Vec<(&str, usize)> = m.areas.iter().map(|a| (a.area.as_str(), a.index)).collect();
        // first header containing the keyword wins
        assert_eq!(mapped, vec![("System", 3), ("Hokkaido", 4), ("Tokyo", 5)]);
    }

    #[test]
    fn test_archive_headers_map_spot_price_to_system() {
        let registry = Settings::builtin().unwrap().registry;
        let t = table(
            &["年月日", "時刻コード", "スポット価格(円/kWh)"],
            &[&["2010/04/01", "1", "10.0"]],
        );
        let m = detect_columns(&t, &registry).unwrap();
        assert_eq!(m.areas.len(), 1);
        assert_eq!(m.areas[0].area, "System");
    }

    #[test]
    fn test_missing_area_columns_is_schema_drift() {
        let t = table(
            &["date", "period_index", "Nagoya"],
            &[&["2025/04/01", "1", "10.5"]],
        );
        let err = detect_columns(&t, &simple_registry()).unwrap_err();
        assert!(matches!(err, IngestError::SchemaDrift(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_missing_period_is_schema_drift() {
        let t = table(&["date", "Tokyo"], &[&["2025/04/01", "10.5"]]);
        let err = detect_columns(&t, &simple_registry()).unwrap_err();
        assert!(matches!(err, IngestError::SchemaDrift(msg) if msg.contains("period")));
    }

    #[test]
    fn test_non_numeric_column_is_not_mapped() {
        let t = table(
            &["date", "period_index", "Tokyo note", "Tokyo", "Osaka"],
            &[
                &["2025/04/01", "1", "n/a", "10.5", "12.0"],
                &["2025/04/01", "2", "n/a", "11.0", "12.5"],
            ],
        );
        let m = detect_columns(&t, &simple_registry()).unwrap();
        assert_eq!(m.areas[0].index, 3);
    }

    #[test]
    fn test_header_claimed_once() {
        // "date" keyword would also match the Tokyo header; the date role takes column 0 first
        let t = table(
            &["date", "period_index", "Tokyo update"],
            &[&["2025/04/01", "1", "10.5"]],
        );
        let m = detect_columns(&t, &simple_registry()).unwrap();
        assert_eq!(m.date_col, 0);
        assert_eq!(m.areas[0].index, 2);
    }
}
