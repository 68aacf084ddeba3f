//! Helpers over attribute objects.
//!
//! Resource attributes travel as a JSON object keyed by schema attribute
//! name; these accessors keep the per-resource code free of
//! `.get().and_then()` chains.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub type Attributes = Map<String, Value>;

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

pub fn get_str<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a str> {
    attrs.get(name).and_then(Value::as_str)
}

pub fn get_bool(attrs: &Attributes, name: &str) -> Option<bool> {
    attrs.get(name).and_then(Value::as_bool)
}

pub fn get_i64(attrs: &Attributes, name: &str) -> Option<i64> {
    attrs.get(name).and_then(Value::as_i64)
}

pub fn get_string_list(attrs: &Attributes, name: &str) -> Vec<String> {
    attrs
        .get(name)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Non-empty string attribute, `None` for absent, null, or `""`.
pub fn get_non_empty_str<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a str> {
    get_str(attrs, name).filter(|s| !s.is_empty())
}

/// Flatten an attribute object into dotted `key → string` pairs.
///
/// Maps gain a `name.%` count entry and lists a `name.#` count entry, with
/// elements under `name.<key>` / `name.<index>`. Nulls are omitted. This is
/// the shape attribute assertions are written against.
pub fn flatten(attrs: &Attributes) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (k, v) in attrs {
        flatten_into(&mut out, k, v);
    }
    out
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Array(items) => {
            out.insert(format!("{prefix}.#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_into(out, &format!("{prefix}.{i}"), item);
            }
        }
        Value::Object(obj) => {
            out.insert(format!("{prefix}.%"), obj.len().to_string());
            for (k, v) in obj {
                flatten_into(out, &format!("{prefix}.{k}"), v);
            }
        }
    }
}
