//! Helpers for reading loosely-typed source payloads

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use statlas_core::Timestamp;
use std::str::FromStr;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Array under the first present key, or the payload itself when it is an
/// array
pub fn items<'a>(payload: &'a Value, keys: &[&str]) -> &'a [Value] {
    if let Some(array) = payload.as_array() {
        return array;
    }
    keys.iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// First non-empty string (or number, rendered) under any of `keys`
pub fn text(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match entry.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Strings of an array field; a single string counts as one element
pub fn strings(entry: &Value, key: &str) -> Vec<String> {
    match entry.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

pub fn flag(entry: &Value, key: &str) -> Option<bool> {
    match entry.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "si" | "sí" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Decimal from a JSON number or numeric string (`,` accepted as decimal
/// separator); `null` and blanks are `None`
pub fn decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().replace(',', "."),
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// Calendar date of an observation
///
/// Accepts ISO dates and datetimes, epoch milliseconds, and period labels
/// (`2024`, `2024-03`, `2024M03`, `2024Q2`, `2024-Q2`), which map to the
/// first day of the period.
pub fn date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => n.as_i64().and_then(date_from_epoch_millis),
        Value::String(s) => period_start(s.trim()),
        _ => None,
    }
}

/// Epoch millis stamped at local midnight (UTC+1/+2) land a few hours
/// before UTC midnight, so round to the nearest day. Out-of-range values
/// are `None`.
fn date_from_epoch_millis(millis: i64) -> Option<NaiveDate> {
    let days = millis
        .checked_add(MILLIS_PER_DAY / 2)?
        .div_euclid(MILLIS_PER_DAY);
    DateTime::<Utc>::from_timestamp(days.checked_mul(86_400)?, 0).map(|dt| dt.date_naive())
}

fn period_start(raw: &str) -> Option<NaiveDate> {
    if let Some(head) = raw.get(..10)
        && let Ok(d) = NaiveDate::parse_from_str(head, "%Y-%m-%d")
    {
        return Some(d);
    }

    let year = raw.get(..4)?.parse::<i32>().ok()?;
    let rest = &raw[4..];

    if rest.is_empty() {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    let rest = rest.trim_start_matches('-');
    let month = if let Some(m) = rest.strip_prefix('M') {
        m.parse::<u32>().ok()?
    } else if let Some(q) = rest.strip_prefix('Q') {
        let quarter = q.parse::<u32>().ok()?;
        if !(1..=4).contains(&quarter) {
            return None;
        }
        (quarter - 1) * 3 + 1
    } else if let Some(s) = rest.strip_prefix('S') {
        let half = s.parse::<u32>().ok()?;
        if !(1..=2).contains(&half) {
            return None;
        }
        (half - 1) * 6 + 1
    } else {
        rest.parse::<u32>().ok()?
    };

    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Timestamp of a listing entry (RFC 3339, naive datetime, ISO date or epoch
/// millis)
pub fn timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                return Some(dt.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }
        _ => None,
    }
}
