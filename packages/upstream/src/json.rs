//! Lenient accessors over decoded upstream JSON.
//!
//! Field names drift in case between API generations (`ORDEREDQUANTITY` vs
//! `orderedQuantity`), and numbers arrive as numbers, strings or not at all.
//! Nothing here fails: absent or unusable values come back as defaults.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;

/// Look up `key` in an object, exact match first, then ASCII case-insensitive.
pub fn field<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    let map = obj.as_object()?;
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// First usable value among `keys`, in priority order. Nulls and blank
/// strings are skipped so the next candidate gets a chance.
pub fn first_field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| field(obj, key))
        .find(|v| is_present(v))
}

/// Like [`first_field`], searching several objects in order.
pub fn lookup<'a>(sources: &[&'a Value], keys: &[&str]) -> Option<&'a Value> {
    sources.iter().find_map(|src| first_field(src, keys))
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Scalar rendered as text; containers and null become empty.
pub fn as_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn numeric_text(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

/// Numeric coercion: non-numeric, absent and non-finite values are `0.0`.
pub fn as_f64(v: Option<&Value>) -> f64 {
    let n = match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => numeric_text(s).parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

/// [`as_f64`] clamped at zero, for quantities and prices.
pub fn as_non_negative(v: Option<&Value>) -> f64 {
    as_f64(v).max(0.0)
}

/// Money coercion into an exact decimal. Unusable values are zero.
pub fn as_decimal(v: Option<&Value>) -> Decimal {
    match v {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Decimal::from(i)
            } else {
                Decimal::from_str(&n.to_string())
                    .ok()
                    .or_else(|| n.as_f64().and_then(Decimal::from_f64))
                    .unwrap_or(Decimal::ZERO)
            }
        }
        Some(Value::String(s)) => {
            let s = numeric_text(s);
            Decimal::from_str(&s)
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(Decimal::from_f64))
                .unwrap_or(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    }
}

/// An array as a slice of items; a lone object counts as one item.
pub fn as_items(v: Option<&Value>) -> Vec<&Value> {
    match v {
        Some(Value::Array(items)) => items.iter().filter(|i| i.is_object()).collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}
