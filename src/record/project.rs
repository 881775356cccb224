//! Row projection helpers over JSON rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Follow a dotted path through objects and arrays.
///
/// Object segments are keys, array segments are indices. A missing segment or
/// a `null` anywhere along the path yields `None`.
pub fn value_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Project each row to the value at `path`, or the whole row if `path` is `None`.
///
/// Rows without the value contribute `Value::Null` so positions line up.
pub fn pluck(rows: &[Value], path: Option<&str>) -> Vec<Value> {
    rows.iter()
        .map(|row| project(row, path).unwrap_or(Value::Null))
        .collect()
}

/// Index rows by the value at `key_path`, projecting each to `value_path`.
///
/// String keys are used as they are; numbers and booleans use their JSON
/// text. Rows whose key is missing or not a scalar are skipped. When two rows
/// share a key the later one wins.
pub fn index_by(rows: &[Value], key_path: &str, value_path: Option<&str>) -> BTreeMap<String, Value> {
    let mut indexed = BTreeMap::new();
    for row in rows {
        let Some(key) = value_at(row, key_path).and_then(scalar_key) else {
            continue;
        };
        indexed.insert(key, project(row, value_path).unwrap_or(Value::Null));
    }
    indexed
}

fn project(row: &Value, path: Option<&str>) -> Option<Value> {
    match path {
        Some(path) => value_at(row, path).cloned(),
        None => Some(row.clone()),
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Format a Unix timestamp as `YYYY-MM-DD HH:MM:SS` in UTC. `None` means now;
/// `Some(0)` is the epoch.
///
/// Returns `None` if the timestamp is out of range.
pub fn try_format_utc_stamp(stamp: Option<i64>) -> Option<String> {
    let at: DateTime<Utc> = match stamp {
        Some(secs) => DateTime::from_timestamp(secs, 0)?,
        None => Utc::now(),
    };
    Some(at.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Like [`try_format_utc_stamp`], falling back to the current time when out of range.
pub fn format_utc_stamp(stamp: Option<i64>) -> String {
    try_format_utc_stamp(stamp)
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
}
