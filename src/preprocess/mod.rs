//! Normalizers turning raw CSV batches into typed tables.
//!
//! Both processors run a fixed sequence of in-place stages over the working
//! rows, then project into the typed row structs. They are single-pass:
//! feeding a processor its own normalized output back in is unsupported and
//! fails on the columns the first pass consumed.

pub mod ads;
pub mod pages;

pub use ads::AdsProcessor;
pub use pages::PagesProcessor;

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::CsvRow;

/// Fetch a cell, treating an absent key and an empty cell the same way.
pub(crate) fn cell<'a>(row: &'a CsvRow, col: &str) -> &'a str {
    row.get(col).map(String::as_str).unwrap_or("")
}

/// Coerce a numeric cell to `f64`. Empty cells coerce to 0.
pub(crate) fn parse_float(raw: &str, col: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .with_context(|| format!("column {col}: cannot coerce {raw:?} to a number"))
}

/// Coerce an identifier cell the strict way: integer-parse then re-render,
/// so `"123"` and `"123.0"` both come out as `"123"`.
pub(crate) fn id_string(raw: &str, col: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("column {col}: empty identifier");
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(n.to_string());
    }
    let f = raw
        .parse::<f64>()
        .with_context(|| format!("column {col}: cannot coerce {raw:?} to an identifier"))?;
    Ok((f as i64).to_string())
}

/// Coerce an identifier cell the lenient way: numeric values re-render
/// without `.0` artifacts, anything else passes through trimmed.
pub(crate) fn lenient_id_string(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return n.to_string();
    }
    if let Ok(f) = raw.parse::<f64>() {
        return (f as i64).to_string();
    }
    raw.to_string()
}

/// Coerce a boolean cell. Empty cells coerce to `false`.
pub(crate) fn parse_bool(raw: &str, col: &str) -> Result<bool> {
    match raw.trim() {
        "" | "false" | "False" | "0" => Ok(false),
        "true" | "True" | "1" => Ok(true),
        other => bail!("column {col}: cannot coerce {other:?} to a boolean"),
    }
}

/// Parse a timestamp cell as a UTC-aware datetime. Accepts RFC 3339 plus
/// the common naive fallbacks (treated as UTC); empty cells yield `None`.
pub(crate) fn parse_utc(raw: &str, col: &str) -> Result<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Some(Utc.from_utc_datetime(&naive)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))));
    }
    bail!("column {col}: cannot parse {raw:?} as a datetime")
}

/// Keep the substring before the first `/`, trimmed (`"M / 38"` → `"M"`).
pub(crate) fn truncate_at_slash(raw: &str) -> String {
    raw.split('/').next().unwrap_or("").trim().to_string()
}

/// Flatten a JSON value into dot-joined leaf keys
/// (`photo.high_resolution.timestamp` style). Arrays and scalars are
/// leaves; objects recurse.
pub(crate) fn flatten_json(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let joined = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_json(&joined, nested, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use serde_json::json;

    #[test]
    fn id_string_strips_decimal_noise() {
        assert_eq!(id_string("123", "id").unwrap(), "123");
        assert_eq!(id_string("123.0", "id").unwrap(), "123");
        assert!(id_string("", "id").is_err());
        assert!(id_string("abc", "id").is_err());
    }

    #[test]
    fn lenient_id_string_passes_text_through() {
        assert_eq!(lenient_id_string("456.0"), "456");
        assert_eq!(lenient_id_string("FR"), "FR");
    }

    #[test]
    fn empty_numeric_cells_coerce_to_zero() {
        assert_eq!(parse_float("", "n").unwrap(), 0.0);
        assert_eq!(parse_float("17.5", "n").unwrap(), 17.5);
        assert!(parse_float("3 vues", "n").is_err());
    }

    #[test]
    fn bool_cells_parse_leniently() {
        assert!(parse_bool("true", "b").unwrap());
        assert!(parse_bool("True", "b").unwrap());
        assert!(!parse_bool("", "b").unwrap());
        assert!(parse_bool("peut-être", "b").is_err());
    }

    #[test]
    fn timestamps_convert_offsets_to_utc() {
        let parsed = parse_utc("2022-01-12T17:13:21+01:00", "t").unwrap().unwrap();
        assert_eq!(parsed.hour(), 16);
        assert_eq!(parse_utc("", "t").unwrap(), None);
        assert!(parse_utc("hier", "t").is_err());
    }

    #[test]
    fn size_truncates_before_the_first_slash() {
        assert_eq!(truncate_at_slash("M / 38"), "M");
        assert_eq!(truncate_at_slash("Unique"), "Unique");
        assert_eq!(truncate_at_slash(""), "");
    }

    #[test]
    fn flatten_joins_nested_keys_with_dots() {
        let value = json!({"url": "https://img/1.jpg",
                           "high_resolution": {"timestamp": 1641996821}});
        let mut flat = BTreeMap::new();
        flatten_json("", &value, &mut flat);

        assert_eq!(flat["url"], "https://img/1.jpg");
        assert_eq!(flat["high_resolution.timestamp"], 1641996821);
    }
}
