//! Collected workflow values and presence rules.

use serde_json::Value;
use std::collections::HashMap;

/// Values collected by a workflow instance, keyed by field id.
///
/// Field ids are unique across a whole config, so one flat map covers all steps.
pub type Values = HashMap<String, Value>;

/// Whether a value counts as filled in.
///
/// `null`, an empty array and a blank string are absent; any other value
/// (including `false` and `0`) is present.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Read a value as a number, accepting numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
