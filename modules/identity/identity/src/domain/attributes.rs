//! Dotted-path lookup and scalar equality over attribute documents.
//!
//! The same equality rules back the in-memory descriptor store and the
//! SQL filter builder: string compare for strings, numeric compare with
//! integer/float widening for numbers.

use serde_json::Value;

use crate::domain::stores::AttributeFilters;

/// Resolve a dotted path (`manager.email`) inside a JSON object.
#[must_use]
pub fn lookup_path<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Scalar equality with numeric widening: `5` equals `5.0`.
#[must_use]
pub fn scalars_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(xi), Some(yi)) => xi == yi,
            _ => match (x.as_f64(), y.as_f64()) {
                (Some(xf), Some(yf)) => (xf - yf).abs() < f64::EPSILON,
                _ => false,
            },
        },
        _ => a == b,
    }
}

/// True when every filter path resolves to an equal scalar in `doc`.
/// An empty filter map matches every document.
#[must_use]
pub fn matches_filters(doc: &Value, filters: &AttributeFilters) -> bool {
    filters
        .iter()
        .all(|(path, expected)| lookup_path(doc, path).is_some_and(|v| scalars_equal(v, expected)))
}

/// Canonical text form used for the indexed-attribute rows. Integral
/// floats collapse to their integer form so indexed and JSON-path
/// filters agree on numeric widening.
#[must_use]
pub fn scalar_to_index_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        format!("{f:.0}")
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        _ => None,
    }
}
