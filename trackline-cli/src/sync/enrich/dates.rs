//! Delivery-date token normalization
//!
//! Estimate strings are `|`-delimited tokens, each either a bare date/datetime
//! or `<date> [<count>]`. `convert_dates` rewrites every parseable date to
//! `YYYY-MM-DD` and leaves everything else readable. It is idempotent.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Delimiter between estimate tokens at the display stage
pub const DISPLAY_DELIMITER: &str = " | ";

static COUNTED_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\[(\d+)\]$").expect("static pattern"));

/// Date layouts accepted after the time-of-day has been stripped
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %b %Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%B %d %Y",
];

/// Parse a date written in any of the layouts seen in carrier payloads and sheets
pub fn parse_loose_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    // Compact `YYYYMMDD` (UPS)
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        let year = value[0..4].parse().ok()?;
        let month = value[4..6].parse().ok()?;
        let day = value[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Drop everything from the first literal `T` onwards (ISO time-of-day)
pub fn strip_time(value: &str) -> &str {
    match value.find('T') {
        Some(pos) => &value[..pos],
        None => value,
    }
}

/// Parse the date part of an estimate token, ignoring any time-of-day
pub fn parse_estimate_date(value: &str) -> Option<NaiveDate> {
    parse_loose_date(strip_time(value.trim()))
}

/// Normalize a `|`-delimited estimate string
///
/// - `<date> [n]` with a parseable date becomes `YYYY-MM-DD [n]`
/// - `<junk> [n]` keeps only `[n]` when `n` is nonzero, else stays verbatim
/// - a bare parseable date becomes `YYYY-MM-DD`
/// - anything else stays verbatim
///
/// Tokens are trimmed, blank tokens dropped, and the result re-joined with
/// `" | "`. Blank input is returned unchanged.
pub fn convert_dates(value: &str) -> String {
    if value.trim().is_empty() {
        return value.to_string();
    }

    let formatted: Vec<String> = value
        .split('|')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(convert_token)
        .collect();

    formatted.join(DISPLAY_DELIMITER)
}

fn convert_token(token: &str) -> String {
    if let Some(caps) = COUNTED_TOKEN.captures(token) {
        let date_part = caps.get(1).map_or("", |m| m.as_str());
        let count = caps.get(2).map_or("", |m| m.as_str());

        return match parse_estimate_date(date_part) {
            Some(date) => format!("{} [{}]", date.format("%Y-%m-%d"), count),
            None if count.bytes().any(|b| b != b'0') => format!("[{}]", count),
            None => token.to_string(),
        };
    }

    match parse_estimate_date(token) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => token.to_string(),
    }
}

/// Turn a raw-stage (`;`-joined) estimate into its display form
pub fn display_estimate(raw: &str) -> String {
    let tokens: Vec<&str> = raw.split(';').map(str::trim).collect();
    convert_dates(&tokens.join(DISPLAY_DELIMITER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loose_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5);
        assert_eq!(parse_loose_date("2024-01-05"), expected);
        assert_eq!(parse_loose_date("20240105"), expected);
        assert_eq!(parse_loose_date("2024/01/05"), expected);
        assert_eq!(parse_loose_date("01/05/2024"), expected);
        assert_eq!(parse_loose_date("Jan 05, 2024"), expected);
        assert_eq!(parse_loose_date("2024-01-05 10:30:00"), expected);
        assert_eq!(parse_loose_date("No data"), None);
        assert_eq!(parse_loose_date("20241305"), None);
    }

    #[test]
    fn test_day_first_fallback() {
        // 25 cannot be a month, so the day-first layout applies
        assert_eq!(
            parse_loose_date("25/01/2024"),
            NaiveDate::from_ymd_opt(2024, 1, 25)
        );
    }

    #[test]
    fn test_strips_time_component() {
        assert_eq!(convert_dates("2024-01-05T23:59:00-06:00"), "2024-01-05");
        assert_eq!(
            convert_dates("2024-02-01T12:00:00 [2]"),
            "2024-02-01 [2]"
        );
    }

    #[test]
    fn test_mixed_tokens() {
        let input = "2024-01-05T10:00:00 [1] | No data | Error: timeout | 20240301";
        assert_eq!(
            convert_dates(input),
            "2024-01-05 [1] | No data | Error: timeout | 2024-03-01"
        );
    }

    #[test]
    fn test_unparseable_with_count() {
        assert_eq!(convert_dates("pending [3]"), "[3]");
        assert_eq!(convert_dates("pending [0]"), "pending [0]");
        assert_eq!(convert_dates("pending [00]"), "pending [00]");
    }

    #[test]
    fn test_blank_input_unchanged() {
        assert_eq!(convert_dates(""), "");
        assert_eq!(convert_dates("   "), "   ");
        assert_eq!(convert_dates(" | "), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "  ",
            " | ",
            "2024-01-05",
            "2024-01-05T23:59:00-06:00 [2]|bogus [4]|bogus [0]",
            "No data | Error: T-minus [7]",
            "[5]",
            "[0]",
            "x [2] y",
            "01/05/2024|Jan 05, 2024 [1]",
            "Error: Timeout",
            "a|b||c",
        ];
        for sample in samples {
            let once = convert_dates(sample);
            assert_eq!(convert_dates(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_display_estimate_switches_delimiter() {
        assert_eq!(
            display_estimate("2024-01-05;Error: x;2024-02-01 [2]"),
            "2024-01-05 | Error: x | 2024-02-01 [2]"
        );
    }
}
