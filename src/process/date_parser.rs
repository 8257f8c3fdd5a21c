use chrono::NaiveDate;

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d", "%Y.%m.%d"];

/// Parse a publisher date cell. Accepts `YYYY/MM/DD`, `YYYY-MM-DD` and
/// `YYYY.MM.DD`, unpadded month/day, and ignores a trailing time-of-day.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let token = s.trim().trim_matches('"').split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
}
