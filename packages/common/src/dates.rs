use chrono::NaiveDate;

/// Date layouts seen from the exchange, tried in order.
const ACCEPTED_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y"];

/// Parse an upstream date into a calendar date.
///
/// Accepts `YYYY-MM-DD`, `DD-MM-YYYY` and `DD.MM.YYYY`. Anything else,
/// including timestamps, yields `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 10 {
        return None;
    }
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// ISO-8601 rendering used everywhere a date leaves the system.
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
