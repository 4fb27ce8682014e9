//! Per-resource CRUD adapters.
//!
//! Every adapter is the same shape: a pure `build_properties` (flat config
//! to wire bag), a pure `absorb_properties` (wire bag back to flat config,
//! remainder preserved as additional properties), and thin async CRUD
//! wrappers over [`adf_client::FactoryClient`].

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

use adf_client::{Collection, FactoryClient, ResourceId};
use adf_core::PropertyBag;

pub mod binary_dataset;
pub mod custom_dataset;
pub mod data;
pub mod linked_custom_service;
pub mod pipeline;
pub mod sql_linked_service;

pub use data::ResourceData;

/// Fail a create when the target already exists; existing resources must
/// be imported, not silently overwritten.
pub(crate) async fn ensure_absent(
    client: &dyn FactoryClient,
    collection: Collection,
    id: &ResourceId,
    kind: &str,
) -> Result<()> {
    let existing = client
        .get(collection, id, None)
        .await
        .with_context(|| format!("checking for an existing {} {}", kind, id))?;
    if existing.is_some() {
        bail!("a {} named {} already exists; import it into state to manage it", kind, id);
    }
    Ok(())
}

pub(crate) fn linked_service_reference(
    name: &str,
    parameters: &BTreeMap<String, String>,
) -> Value {
    let mut out = PropertyBag::new();
    out.insert("referenceName".into(), json!(name));
    out.insert("type".into(), json!("LinkedServiceReference"));
    if !parameters.is_empty() {
        out.insert(
            "parameters".into(),
            Value::Object(parameters.iter().map(|(k, v)| (k.clone(), json!(v))).collect()),
        );
    }
    Value::Object(out)
}

pub(crate) fn integration_runtime_reference(name: &str) -> Value {
    json!({"referenceName": name, "type": "IntegrationRuntimeReference"})
}

pub(crate) fn string_map_to_bag(map: BTreeMap<String, String>) -> PropertyBag {
    map.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
}

/// Pull the `properties` object out of a response envelope.
pub(crate) fn properties_object(
    properties: Value,
    kind: &str,
    id: &ResourceId,
) -> Result<PropertyBag> {
    match properties {
        Value::Object(map) => Ok(map),
        other => bail!(
            "{} {}: response `properties` is not an object, got {}",
            kind,
            id,
            adf_core::value_kind(&other)
        ),
    }
}
