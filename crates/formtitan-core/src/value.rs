//! Dotted-path access and loose value semantics
//!
//! Form data is a JSON object. Field names address it with dotted paths
//! (`address.city`), and rule evaluation needs the loose truthiness,
//! numeric coercion and string forms that form inputs naturally carry.

use serde_json::{Map, Value};

/// Read the value at a dotted path.
///
/// Missing levels, and levels that are neither objects nor arrays, yield
/// `None`. Array levels are indexed with numeric segments (`items.0`).
pub fn get_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write a value at a dotted path, creating missing levels as objects.
///
/// Array levels take numeric segments and are written in place, padded with
/// `null` up to the index. Any other level that is not an object is
/// replaced by an empty object.
pub fn set_path(data: &mut Value, path: &str, value: Value) {
    let mut keys: Vec<&str> = path.split('.').collect();
    let last = keys.pop().unwrap_or_default();

    let mut current = data;
    for key in keys {
        current = slot_mut(current, key);
    }
    *slot_mut(current, last) = value;
}

fn slot_mut<'a>(container: &'a mut Value, key: &str) -> &'a mut Value {
    let index = key.parse::<usize>().ok().filter(|_| container.is_array());
    match (container, index) {
        (Value::Array(items), Some(index)) => {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[index]
        }
        (other, _) => ensure_object(other).entry(key.to_string()).or_insert(Value::Null),
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

/// Emptiness as understood by the `required` check.
///
/// Missing, `null`, `false`, blank strings and empty arrays count as empty.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// Loose truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Numeric coercion. Values without a numeric reading become `NaN`.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [only] => to_number(Some(only)),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

/// String form of a value (arrays join their elements with commas).
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) if n.is_f64() => format_number(n.as_f64().unwrap_or(f64::NAN)),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Length used by the `minLength` / `maxLength` checks
pub fn length_of(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        other => display_string(other).chars().count(),
    }
}

/// Strict equality where numbers compare by value (`1 == 1.0`).
///
/// A missing value reads as `null`.
pub fn strict_equals(left: Option<&Value>, right: &Value) -> bool {
    let left = left.unwrap_or(&Value::Null);
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

/// Format a number without a trailing `.0` for integral values
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
