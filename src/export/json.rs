//! JSON rendering of normalized messages.
//!
//! Output can be pruned: keys (and list items) whose value is `null` or `""`
//! are dropped at every nesting level. `false`, `0`, `[]` and `{}` survive.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Serialize `value` to a JSON value and prune empty entries.
pub fn to_clean_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    let mut value = serde_json::to_value(value)?;
    prune(&mut value);
    Ok(value)
}

/// Serialize `value` to a JSON string, pruned of empty entries.
pub fn to_clean_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    render(&to_clean_value(value)?, pretty)
}

/// Serialize `value` to a JSON string without pruning.
pub fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    render(&serde_json::to_value(value)?, pretty)
}

fn render(value: &Value, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

/// Recursively drop `null` and `""` from objects and arrays, in place.
pub fn prune(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !is_empty_leaf(v));
            map.values_mut().for_each(prune);
        }
        Value::Array(items) => {
            items.retain(|v| !is_empty_leaf(v));
            items.iter_mut().for_each(prune);
        }
        _ => {}
    }
}

fn is_empty_leaf(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
