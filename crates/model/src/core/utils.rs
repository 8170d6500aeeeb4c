use crate::core::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parses a calendar date. Custom formats are tried first, then the built-in
/// ones, then anything that parses as a timestamp (truncated to its date).
pub fn parse_date(raw: &str, custom_formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    custom_formats
        .iter()
        .map(String::as_str)
        .chain(DATE_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date()))
}

/// Parses only `%Y-%m-%d`, the one date form that reads the same whatever
/// the day/month order of the data.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parses an integer or decimal, accepting `,` thousands separators
/// (`1,234.5`). Integers stay `Value::Int`.
pub fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let cleaned = if raw.contains(',') {
        if !has_valid_grouping(raw) {
            return None;
        }
        raw.replace(',', "")
    } else {
        raw.to_string()
    };

    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(Value::Int(v));
    }

    // Reject the textual forms f64 accepts but a data cell should not
    let lowered = cleaned.to_ascii_lowercase();
    if lowered.contains("inf") || lowered.contains("nan") {
        return None;
    }
    cleaned.parse::<f64>().ok().map(Value::Float)
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

/// Rounds to the given number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn has_valid_grouping(raw: &str) -> bool {
    let unsigned = raw.trim_start_matches(['-', '+']);
    let integer_part = unsigned.split('.').next().unwrap_or_default();
    let mut groups = integer_part.split(',');

    match groups.next() {
        Some(first) if (1..=3).contains(&first.len()) => {}
        _ => return false,
    }
    groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}
