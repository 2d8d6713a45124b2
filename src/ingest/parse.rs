//! Lenient cell parsing.
//!
//! Spreadsheet exports are messy; every parser here returns `None` rather
//! than failing so callers can substitute their own default.

use chrono::NaiveDate;

/// Date formats tried in order against the first token of a date cell.
pub const DATE_FORMATS: [&str; 4] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d", "%d/%m/%Y"];

/// Cell values that mean "no value".
pub fn is_missing(raw: &str) -> bool {
    let value = raw.trim();
    value.is_empty()
        || value.eq_ignore_ascii_case("n/a")
        || value.eq_ignore_ascii_case("na")
        || value.eq_ignore_ascii_case("nan")
        || value.eq_ignore_ascii_case("none")
}

/// Parse a numeric cell, accepting thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }

    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a percentage cell; a trailing `%` is optional.
pub fn parse_percent(raw: &str) -> Option<f64> {
    parse_number(raw.trim().trim_end_matches('%'))
}

/// Parse a date cell, ignoring any time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if is_missing(raw) {
        return None;
    }

    let token = raw.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("120"), Some(120.0));
        assert_eq!(parse_number(" 1,250.5 "), Some(1250.5));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number("N/A"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("95%"), Some(95.0));
        assert_eq!(parse_percent("40"), Some(40.0));
        assert_eq!(parse_percent("%"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date("03/15/24"), expected);
        assert_eq!(parse_date("03/15/2024"), expected);
        assert_eq!(parse_date("2024-03-15"), expected);
        assert_eq!(parse_date("2024-03-15 00:00:00"), expected);
        // Day-first only applies when month-first is impossible
        assert_eq!(parse_date("15/03/2024"), expected);
    }

    #[test]
    fn test_parse_date_failures() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("n/a"), None);
        assert_eq!(parse_date("next quarter"), None);
        assert_eq!(parse_date("2024-13-45"), None);
    }
}
