//! Shared utility functions for flu surveillance crates.

/// Relaxed numeric parsing for string-typed public records.
///
/// Every numeric field read from a feed goes through [`numeric::normalize`]:
/// missing, blank and malformed input all become `0.0`, never NaN.
pub mod numeric {
    use serde::{Deserialize, Serialize};

    /// A numeric field as delivered by a JSON feed.
    ///
    /// Socrata endpoints send numbers as strings, some sources send real
    /// numbers, and a few fields occasionally carry something else entirely.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum RawValue {
        Number(f64),
        Text(String),
        Other(serde_json::Value),
    }

    impl RawValue {
        /// Parse the value, returning `None` when no finite number can be read.
        pub fn to_number(&self) -> Option<f64> {
            match self {
                RawValue::Number(n) if n.is_finite() => Some(*n),
                RawValue::Number(_) => None,
                RawValue::Text(s) => try_parse_numeric(s),
                RawValue::Other(_) => None,
            }
        }

        /// True for an empty or whitespace-only string.
        pub fn is_blank(&self) -> bool {
            matches!(self, RawValue::Text(s) if s.trim().is_empty())
        }

        pub fn as_text(&self) -> Option<&str> {
            match self {
                RawValue::Text(s) => Some(s.as_str()),
                _ => None,
            }
        }
    }

    impl From<&str> for RawValue {
        fn from(value: &str) -> Self {
            RawValue::Text(value.to_string())
        }
    }

    impl From<f64> for RawValue {
        fn from(value: f64) -> Self {
            RawValue::Number(value)
        }
    }

    /// Normalize an optional raw field to a finite number, defaulting to 0.
    pub fn normalize(value: Option<&RawValue>) -> f64 {
        value.and_then(RawValue::to_number).unwrap_or(0.0)
    }

    /// Parse a string to a finite number, defaulting to 0.
    pub fn parse_numeric(s: &str) -> f64 {
        try_parse_numeric(s).unwrap_or(0.0)
    }

    /// Read the longest numeric prefix of `s`.
    ///
    /// Leading whitespace is skipped and trailing garbage ignored, so
    /// `"12.5 mg"` reads as `12.5`. Returns `None` when there is no leading
    /// number or the result is not finite.
    pub fn try_parse_numeric(s: &str) -> Option<f64> {
        let text = s.trim_start();
        let bytes = text.as_bytes();
        let digits_from = |mut i: usize| {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            i
        };

        let mut pos = 0;
        let negative = match bytes.first() {
            Some(b'-') => {
                pos = 1;
                true
            }
            Some(b'+') => {
                pos = 1;
                false
            }
            _ => false,
        };

        let int_end = digits_from(pos);
        let int_part = &text[pos..int_end];
        pos = int_end;

        let mut frac_part = "";
        if bytes.get(pos) == Some(&b'.') {
            let frac_end = digits_from(pos + 1);
            frac_part = &text[pos + 1..frac_end];
            if !frac_part.is_empty() {
                pos = frac_end;
            }
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let mut exponent = "";
        if matches!(bytes.get(pos), Some(b'e') | Some(b'E')) {
            let mut exp_pos = pos + 1;
            if matches!(bytes.get(exp_pos), Some(b'-') | Some(b'+')) {
                exp_pos += 1;
            }
            let exp_end = digits_from(exp_pos);
            if exp_end > exp_pos {
                exponent = &text[pos..exp_end];
            }
        }

        let literal = format!(
            "{}{}.{}{}",
            if negative { "-" } else { "" },
            if int_part.is_empty() { "0" } else { int_part },
            if frac_part.is_empty() { "0" } else { frac_part },
            exponent
        );
        literal.parse::<f64>().ok().filter(|v| v.is_finite())
    }

}

/// Date utility functions
pub mod dates {
    use crate::error::DateError;
    use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
    }

    /// Parse the ISO-like date and timestamp shapes used by the CDC feeds.
    ///
    /// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.fff]`,
    /// `YYYY-MM-DD HH:MM:SS` and RFC 3339 with an offset. Only the calendar
    /// date is kept; for offset timestamps that is the date in the given offset.
    pub fn parse_iso_date(s: &str) -> anyhow::Result<NaiveDate> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(date);
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(date_time) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(date_time.date());
            }
        }
        if let Ok(date_time) = DateTime::parse_from_rfc3339(s) {
            return Ok(date_time.date_naive());
        }
        Err(DateError(format!("unrecognized date: {s:?}")).into())
    }

    /// The date `weeks` weeks before `today`.
    pub fn weeks_ago(today: NaiveDate, weeks: i64) -> NaiveDate {
        today - Duration::weeks(weeks)
    }

    /// Today's date on the local clock.
    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

}

/// Display formatting for dashboard values.
pub mod format {
    use chrono::NaiveDate;

    /// Format a number as a percentage with the given decimal places.
    pub fn format_percentage(value: f64, decimals: usize) -> String {
        format!("{value:.decimals$}%")
    }

    /// Fixed decimal places with thousands separators, e.g. `1,234.50`.
    pub fn format_fixed(value: f64, decimals: usize) -> String {
        let raw = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match raw.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (raw.as_str(), None),
        };
        let mut out = String::with_capacity(raw.len() + raw.len() / 3 + 1);
        if value < 0.0 && raw.bytes().any(|b| (b'1'..=b'9').contains(&b)) {
            out.push('-');
        }
        out.push_str(&group_thousands(int_part));
        if let Some(frac_part) = frac_part {
            out.push('.');
            out.push_str(frac_part);
        }
        out
    }

    /// Thousands separators and at most three fractional digits.
    pub fn format_number(value: f64) -> String {
        let fixed = format_fixed(value, 3);
        fixed
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }

    /// Abbreviate large values: `1.5M`, `12.3K`, `950`.
    pub fn format_large_number(value: f64) -> String {
        if value >= 1_000_000.0 {
            format!("{:.1}M", value / 1_000_000.0)
        } else if value >= 1_000.0 {
            format!("{:.1}K", value / 1_000.0)
        } else {
            format!("{value:.0}")
        }
    }

    /// Format a date for display, e.g. `Jan 6, 2024`.
    pub fn format_display_date(date: &NaiveDate) -> String {
        date.format("%b %-d, %Y").to_string()
    }

    fn group_thousands(digits: &str) -> String {
        let len = digits.len();
        let mut out = String::with_capacity(len + len / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        out
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_format_percentage() {
            assert_eq!(format_percentage(12.345, 1), "12.3%");
            assert_eq!(format_percentage(-4.0, 0), "-4%");
        }

        #[test]
        fn test_format_number() {
            assert_eq!(format_number(0.0), "0");
            assert_eq!(format_number(999.0), "999");
            assert_eq!(format_number(1234.0), "1,234");
            assert_eq!(format_number(1234567.25), "1,234,567.25");
            assert_eq!(format_number(-9876.5), "-9,876.5");
        }

        #[test]
        fn test_format_fixed() {
            assert_eq!(format_fixed(5.9, 1), "5.9");
            assert_eq!(format_fixed(10000.0, 0), "10,000");
            assert_eq!(format_fixed(-0.01, 1), "0.0");
        }

        #[test]
        fn test_format_large_number() {
            assert_eq!(format_large_number(2_500_000.0), "2.5M");
            assert_eq!(format_large_number(12_340.0), "12.3K");
            assert_eq!(format_large_number(950.0), "950");
        }

        #[test]
        fn test_format_display_date() {
            let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
            assert_eq!(format_display_date(&date), "Jan 6, 2024");
        }
    }
}

/// Input validators
pub mod validate {
    use crate::dates::parse_iso_date;

    pub fn is_valid_number(value: f64) -> bool {
        value.is_finite()
    }

    pub fn is_valid_date(s: &str) -> bool {
        parse_iso_date(s).is_ok()
    }

    /// Trim and uppercase a state code, keeping it only if it is two letters.
    pub fn sanitize_state_code(state: Option<&str>) -> Option<String> {
        let cleaned = state?.trim().to_uppercase();
        if cleaned.chars().count() == 2 && cleaned.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(cleaned)
        } else {
            None
        }
    }

}

/// Error types
pub mod error {
    use std::fmt;

    #[derive(Debug)]
    pub struct DateError(pub String);

    impl fmt::Display for DateError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Date error: {}", self.0)
        }
    }

    impl std::error::Error for DateError {}
}
