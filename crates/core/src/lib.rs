//! adf core types: property bags, the diagnostics side-channel, and
//! canonical-JSON helpers shared by every other crate.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire-level carrier for a resource's `properties` object.
///
/// `serde_json::Map` is BTree-backed, so keys are always sorted and a
/// serialized bag is already in canonical form.
pub type PropertyBag = serde_json::Map<String, Value>;

/// One skipped/degraded value recorded during a best-effort flatten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub field: String,
    pub detail: String,
}

/// Side-channel for best-effort decode paths.
///
/// Flatten helpers never fail: anything they cannot represent is dropped,
/// logged, and recorded here so callers (and tests) can see what went
/// missing without scraping log output.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a skipped value for `field`.
    pub fn skip(&mut self, field: &str, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(field = %field, detail = %detail, "skipping value during flatten");
        self.entries.push(Diagnostic { field: field.to_string(), detail });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// True when some entry concerns the given field.
    pub fn mentions(&self, field: &str) -> bool {
        self.entries.iter().any(|d| d.field == field)
    }
}

/// Canonical (key-sorted, whitespace-free) serialization of a JSON value.
pub fn canonical_json(v: &Value) -> String {
    v.to_string()
}

/// Parse `raw` and re-serialize it in canonical form.
pub fn normalize_json(raw: &str) -> Result<String> {
    let v: Value = serde_json::from_str(raw).context("parsing JSON")?;
    Ok(canonical_json(&v))
}

/// Equality up to key ordering and whitespace: both sides must parse, and
/// their canonical serializations must be byte-identical. Used to suppress
/// diffs caused only by the encoder's key order.
pub fn json_equivalent(a: &str, b: &str) -> bool {
    match (serde_json::from_str::<Value>(a), serde_json::from_str::<Value>(b)) {
        (Ok(av), Ok(bv)) => canonical_json(&av) == canonical_json(&bv),
        _ => false,
    }
}

/// Short human name for a JSON value's type, for error messages.
pub fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
