//! Custom linked service: the service type and its `typeProperties` come
//! in as raw JSON, everything the schema does not model rides along in
//! `additional_properties`.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use serde_json::{json, Value};

use adf_client::{Collection, Envelope, FactoryClient, ResourceId};
use adf_codec::{
    expand_annotations, expand_parameters, flatten_parameters, merge, project, NamedField,
};
use adf_core::{canonical_json, json_equivalent, Diagnostics, PropertyBag};

use crate::{ensure_absent, integration_runtime_reference, string_map_to_bag, ResourceData};

const KIND: &str = "linked custom service";

const FIELDS: &[NamedField] = &[
    NamedField::text("type"),
    NamedField::any("typeProperties"),
    NamedField::text("description"),
    NamedField::object("parameters"),
    NamedField::text_list("annotations"),
    NamedField::object("connectVia"),
];

/// Expand the flat config into the wire-level properties bag.
pub fn build_properties(label: &str, data: &ResourceData) -> Result<PropertyBag> {
    let ty = data
        .get_string("type")
        .ok_or_else(|| anyhow!("field `type` on {} {}: required", KIND, label))?;
    let raw = data
        .get_string("type_properties_json")
        .ok_or_else(|| anyhow!("field `type_properties_json` on {} {}: required", KIND, label))?;
    let type_properties: Value = serde_json::from_str(&raw)
        .with_context(|| format!("field `type_properties_json` on {} {}: invalid JSON", KIND, label))?;

    let mut named = PropertyBag::new();
    named.insert("type".into(), json!(ty));
    named.insert("typeProperties".into(), type_properties);
    if let Some(d) = data.get_string("description") {
        named.insert("description".into(), json!(d));
    }
    let params = data.get_string_map("parameters");
    if !params.is_empty() {
        named.insert("parameters".into(), expand_parameters(&params));
    }
    let annotations = data.get_string_list("annotations");
    if !annotations.is_empty() {
        named.insert("annotations".into(), expand_annotations(&annotations));
    }
    if let Some(ir) = data.get_string("integration_runtime") {
        named.insert("connectVia".into(), integration_runtime_reference(&ir));
    }

    let extra = string_map_to_bag(data.get_string_map("additional_properties"));
    Ok(merge(PropertyBag::new(), named, &extra))
}

/// Flatten a wire-level properties bag back into the flat config. The
/// projector's remainder becomes `additional_properties`.
pub fn absorb_properties(
    bag: PropertyBag,
    label: &str,
    data: &mut ResourceData,
) -> Result<Diagnostics> {
    let mut diags = Diagnostics::new();
    let mut proj = project(bag, FIELDS, label, &mut diags)?;

    if let Some(ty) = proj.take_text("type") {
        data.set("type", json!(ty));
    }
    if let Some(tp) = proj.take("typeProperties") {
        let canonical = canonical_json(&tp);
        // Keep the user's formatting when only the encoding differs.
        let keep = data
            .get_string("type_properties_json")
            .map(|old| json_equivalent(&old, &canonical))
            .unwrap_or(false);
        if !keep {
            data.set("type_properties_json", json!(canonical));
        }
    }
    if let Some(d) = proj.take_text("description") {
        data.set("description", json!(d));
    }
    if let Some(params) = proj.take("parameters") {
        let flat = flatten_parameters(&params, "parameters", &mut diags);
        data.set("parameters", serde_json::to_value(flat)?);
    }
    data.set("annotations", json!(proj.take_text_list("annotations")));
    if let Some(via) = proj.take("connectVia") {
        if let Some(name) = via.get("referenceName").and_then(Value::as_str) {
            data.set("integration_runtime", json!(name));
        }
    }

    // The schema models additional properties as a string map; anything
    // else the service returned is dropped with a diagnostic.
    let mut extra = PropertyBag::new();
    for (k, v) in proj.remainder {
        match v {
            Value::String(_) => {
                extra.insert(k, v);
            }
            other => diags.skip(
                "additional_properties",
                format!("key `{}` is {}, not a string", k, adf_core::value_kind(&other)),
            ),
        }
    }
    data.set("additional_properties", Value::Object(extra));
    Ok(diags)
}

pub async fn create(
    client: &dyn FactoryClient,
    id: &ResourceId,
    data: &mut ResourceData,
) -> Result<()> {
    apply(client, id, data, true).await
}

pub async fn update(
    client: &dyn FactoryClient,
    id: &ResourceId,
    data: &mut ResourceData,
) -> Result<()> {
    apply(client, id, data, false).await
}

async fn apply(
    client: &dyn FactoryClient,
    id: &ResourceId,
    data: &mut ResourceData,
    is_create: bool,
) -> Result<()> {
    counter!("linked_service_apply_attempts", 1u64);
    if is_create {
        ensure_absent(client, Collection::LinkedServices, id, KIND).await?;
    }
    let bag = build_properties(&id.to_string(), data)?;
    let env = Envelope::new(id.name.clone(), Value::Object(bag));
    let saved = client
        .create_or_update(Collection::LinkedServices, id, env, None)
        .await
        .with_context(|| format!("creating {} {}", KIND, id))?;
    data.set_id(saved.id);
    counter!("linked_service_apply_ok", 1u64);
    Ok(())
}

/// Read the remote state into `data`. A missing resource clears the tracked
/// identity and succeeds.
pub async fn read(
    client: &dyn FactoryClient,
    id: &ResourceId,
    data: &mut ResourceData,
) -> Result<Diagnostics> {
    match client.get(Collection::LinkedServices, id, None).await? {
        None => {
            tracing::info!(id = %id, "{} not found; clearing identity", KIND);
            data.set_id(None);
            Ok(Diagnostics::new())
        }
        Some(env) => {
            let bag = crate::properties_object(env.properties, KIND, id)?;
            data.set_id(env.id);
            absorb_properties(bag, &id.to_string(), data)
        }
    }
}

pub async fn delete(client: &dyn FactoryClient, id: &ResourceId) -> Result<()> {
    client
        .delete(Collection::LinkedServices, id)
        .await
        .with_context(|| format!("deleting {} {}", KIND, id))?;
    Ok(())
}
