//! Expand/flatten pairs for the small typed sub-structures: parameter and
//! variable maps, annotation lists, and dataset folders.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use adf_core::{value_kind, Diagnostics, PropertyBag};

/// `{name: value}` -> `{name: {"type": "String", "defaultValue": value}}`.
///
/// Only string-typed parameters are modeled; that limitation is enforced by
/// the flat side's type, not here.
pub fn expand_parameters(params: &BTreeMap<String, String>) -> Value {
    let mut out = PropertyBag::new();
    for (name, default) in params {
        out.insert(name.clone(), json!({"type": "String", "defaultValue": default}));
    }
    Value::Object(out)
}

/// Inverse of [`expand_parameters`]. Entries whose `defaultValue` is not a
/// string are skipped with a diagnostic, never an error.
pub fn flatten_parameters(
    v: &Value,
    field: &str,
    diags: &mut Diagnostics,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let map = match v.as_object() {
        Some(m) => m,
        None => {
            diags.skip(field, format!("expected an object, got {}", value_kind(v)));
            return out;
        }
    };
    for (name, spec) in map {
        match spec.get("defaultValue") {
            Some(Value::String(s)) => {
                out.insert(name.clone(), s.clone());
            }
            Some(other) => diags.skip(
                field,
                format!("parameter `{}` has a {} defaultValue, only strings are supported", name, value_kind(other)),
            ),
            None => {
                out.insert(name.clone(), String::new());
            }
        }
    }
    out
}

/// Annotations are a bare array of strings on the wire.
pub fn expand_annotations(annotations: &[String]) -> Value {
    Value::Array(annotations.iter().map(|a| Value::String(a.clone())).collect())
}

/// Inverse of [`expand_annotations`]; non-string elements are skipped with
/// a diagnostic.
pub fn flatten_annotations(v: &Value, diags: &mut Diagnostics) -> Vec<String> {
    let items = match v.as_array() {
        Some(a) => a,
        None => {
            diags.skip("annotations", format!("expected an array, got {}", value_kind(v)));
            return Vec::new();
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => out.push(s.clone()),
            other => diags.skip(
                "annotations",
                format!("element is {}, not a string", value_kind(other)),
            ),
        }
    }
    out
}

/// A folder is `{"name": "..."}` on the wire.
pub fn expand_folder(name: &str) -> Value {
    json!({ "name": name })
}

/// Inverse of [`expand_folder`]; anything but an object with a string
/// `name` flattens to no folder.
pub fn flatten_folder(v: &Value) -> Option<String> {
    v.get("name").and_then(Value::as_str).map(str::to_string)
}
