//! Property-bag projector: split named fields out of an arbitrary JSON
//! object and merge them back without disturbing unknown keys.

use anyhow::{bail, Result};
use serde_json::Value;

use adf_core::{value_kind, Diagnostics, PropertyBag};

/// How a named field's raw JSON value is vetted when projected out.
///
/// `Text` and `Object` are strict: a mismatched shape aborts the read.
/// `TextList` and `TextMap` are best-effort at the element level: bad
/// elements are skipped with a diagnostic. `Any` passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Text,
    Object,
    TextList,
    TextMap,
    Any,
}

/// A (key, shape) pair the projector recognizes.
#[derive(Debug, Clone, Copy)]
pub struct NamedField {
    pub key: &'static str,
    pub shape: FieldShape,
}

impl NamedField {
    pub const fn text(key: &'static str) -> Self {
        Self { key, shape: FieldShape::Text }
    }
    pub const fn object(key: &'static str) -> Self {
        Self { key, shape: FieldShape::Object }
    }
    pub const fn text_list(key: &'static str) -> Self {
        Self { key, shape: FieldShape::TextList }
    }
    pub const fn text_map(key: &'static str) -> Self {
        Self { key, shape: FieldShape::TextMap }
    }
    pub const fn any(key: &'static str) -> Self {
        Self { key, shape: FieldShape::Any }
    }
}

/// Result of [`project`]: decoded values keyed by field key, plus whatever
/// was left in the bag. The remainder is the resource's additional
/// properties and must survive the next write verbatim.
#[derive(Debug, Default, Clone)]
pub struct Projection {
    values: PropertyBag,
    pub remainder: PropertyBag,
}

impl Projection {
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn take_text(&mut self, key: &str) -> Option<String> {
        match self.values.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn take_text_list(&mut self, key: &str) -> Vec<String> {
        match self.values.remove(key) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn take_text_map(&mut self, key: &str) -> std::collections::BTreeMap<String, String> {
        let mut out = std::collections::BTreeMap::new();
        if let Some(Value::Object(map)) = self.values.remove(key) {
            for (k, v) in map {
                if let Value::String(s) = v {
                    out.insert(k, s);
                }
            }
        }
        out
    }
}

/// Split `fields` out of `bag`.
///
/// Each recognized key is removed from the bag and vetted against its
/// shape; the leftover bag is returned as the remainder. Field order does
/// not affect the result and no key is decoded twice (removal guarantees
/// both). `resource` only feeds error messages.
pub fn project(
    mut bag: PropertyBag,
    fields: &[NamedField],
    resource: &str,
    diags: &mut Diagnostics,
) -> Result<Projection> {
    let mut values = PropertyBag::new();
    for f in fields {
        let raw = match bag.remove(f.key) {
            Some(v) => v,
            None => continue,
        };
        let vetted = match f.shape {
            FieldShape::Any => raw,
            FieldShape::Text => match raw {
                v @ Value::String(_) => v,
                other => bail!(
                    "field `{}` on {}: expected a string, got {}",
                    f.key,
                    resource,
                    value_kind(&other)
                ),
            },
            FieldShape::Object => match raw {
                v @ Value::Object(_) => v,
                other => bail!(
                    "field `{}` on {}: expected an object, got {}",
                    f.key,
                    resource,
                    value_kind(&other)
                ),
            },
            FieldShape::TextList => match raw {
                Value::Array(items) => {
                    let mut kept = Vec::with_capacity(items.len());
                    for v in items {
                        match v {
                            s @ Value::String(_) => kept.push(s),
                            other => diags.skip(
                                f.key,
                                format!("element is {}, not a string", value_kind(&other)),
                            ),
                        }
                    }
                    Value::Array(kept)
                }
                other => {
                    diags.skip(f.key, format!("expected an array, got {}", value_kind(&other)));
                    Value::Array(Vec::new())
                }
            },
            FieldShape::TextMap => match raw {
                Value::Object(map) => {
                    let mut kept = PropertyBag::new();
                    for (k, v) in map {
                        match v {
                            s @ Value::String(_) => {
                                kept.insert(k, s);
                            }
                            other => diags.skip(
                                f.key,
                                format!("entry `{}` is {}, not a string", k, value_kind(&other)),
                            ),
                        }
                    }
                    Value::Object(kept)
                }
                other => {
                    diags.skip(f.key, format!("expected an object, got {}", value_kind(&other)));
                    Value::Object(PropertyBag::new())
                }
            },
        };
        values.insert(f.key.to_string(), vetted);
    }
    Ok(Projection { values, remainder: bag })
}

/// Merge named field values back into a bag.
///
/// Layering is base, then `extra` (the caller-supplied additional
/// properties), then `named` — so a field the codec owns always wins over
/// a same-named key smuggled through the additional-properties channel.
pub fn merge(base: PropertyBag, named: PropertyBag, extra: &PropertyBag) -> PropertyBag {
    let mut out = base;
    for (k, v) in extra {
        out.insert(k.clone(), v.clone());
    }
    for (k, v) in named {
        out.insert(k, v);
    }
    out
}
