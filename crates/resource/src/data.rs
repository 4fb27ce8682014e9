//! Flat configuration view of a resource.
//!
//! Stand-in for the provider framework's schema store: adapters read named
//! fields out, write results back, and track the remote identity. Reads
//! clear the identity on not-found (idempotent tombstoning).

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a flat JSON object, e.g. a config file loaded by the CLI.
    pub fn from_json(v: Value) -> Result<Self> {
        match v {
            Value::Object(map) => Ok(Self { id: None, fields: map.into_iter().collect() }),
            other => bail!("resource data must be a JSON object, got {}", adf_core::value_kind(&other)),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone().into_iter().collect())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Present-and-non-empty check: `None` for missing keys, nulls, empty
    /// strings, and empty collections.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        let v = self.fields.get(key)?;
        let empty = match v {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(m) => m.is_empty(),
            _ => false,
        };
        if empty {
            None
        } else {
            Some(v)
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_ok(key).and_then(Value::as_str).map(str::to_string)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_ok(key).and_then(Value::as_i64)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.get_ok(key).and_then(Value::as_array) {
            Some(items) => {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }
            None => Vec::new(),
        }
    }

    pub fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(map) = self.get_ok(key).and_then(Value::as_object) {
            for (k, v) in map {
                if let Some(s) = v.as_str() {
                    out.insert(k.clone(), s.to_string());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_ok_hides_empty_values() {
        let data = ResourceData::from_json(json!({
            "a": "",
            "b": "x",
            "c": [],
            "d": {},
            "e": null,
            "f": 0
        }))
        .unwrap();
        assert!(data.get_ok("a").is_none());
        assert!(data.get_ok("b").is_some());
        assert!(data.get_ok("c").is_none());
        assert!(data.get_ok("d").is_none());
        assert!(data.get_ok("e").is_none());
        assert!(data.get_ok("f").is_some());
        assert!(data.get_ok("missing").is_none());
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(ResourceData::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn typed_getters() {
        let data = ResourceData::from_json(json!({
            "name": "x",
            "count": 4,
            "tags": ["a", "b"],
            "params": {"k": "v", "skipped": 1}
        }))
        .unwrap();
        assert_eq!(data.get_string("name").as_deref(), Some("x"));
        assert_eq!(data.get_i64("count"), Some(4));
        assert_eq!(data.get_string_list("tags"), vec!["a", "b"]);
        let m = data.get_string_map("params");
        assert_eq!(m.get("k").map(String::as_str), Some("v"));
        assert!(!m.contains_key("skipped"));
    }

    #[test]
    fn identity_is_separate_from_fields() {
        let mut data = ResourceData::new();
        assert!(data.id().is_none());
        data.set_id(Some("/factories/f/datasets/d".into()));
        assert_eq!(data.id(), Some("/factories/f/datasets/d"));
        data.set_id(None);
        assert!(data.id().is_none());
    }
}
