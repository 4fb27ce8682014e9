//! Pipeline: activities ride in and out as a bare JSON array through the
//! envelope codec; parameters and variables share the string-typed spec
//! shape.

use anyhow::{Context, Result};
use metrics::counter;
use serde_json::{json, Value};

use adf_client::{Collection, Envelope, FactoryClient, ResourceId};
use adf_codec::{
    expand_annotations, expand_folder, expand_parameters, flatten_folder, flatten_parameters,
    merge, project, NamedField,
};
use adf_core::{json_equivalent, Diagnostics, PropertyBag};
use adf_pipeline::{deserialize_activities, serialize_activities};

use crate::{ensure_absent, ResourceData};

const KIND: &str = "pipeline";

const FIELDS: &[NamedField] = &[
    NamedField::any("activities"),
    NamedField::text("description"),
    NamedField::object("folder"),
    NamedField::object("parameters"),
    NamedField::object("variables"),
    NamedField::any("concurrency"),
    NamedField::text_list("annotations"),
];

pub fn build_properties(label: &str, data: &ResourceData) -> Result<PropertyBag> {
    let mut named = PropertyBag::new();
    if let Some(raw) = data.get_string("activities_json") {
        let activities = deserialize_activities(&raw)
            .with_context(|| format!("field `activities_json` on {} {}", KIND, label))?;
        let encoded = serialize_activities(&activities)?;
        named.insert("activities".into(), serde_json::from_str(&encoded)?);
    }
    if let Some(d) = data.get_string("description") {
        named.insert("description".into(), json!(d));
    }
    if let Some(folder) = data.get_string("folder") {
        named.insert("folder".into(), expand_folder(&folder));
    }
    let params = data.get_string_map("parameters");
    if !params.is_empty() {
        named.insert("parameters".into(), expand_parameters(&params));
    }
    let variables = data.get_string_map("variables");
    if !variables.is_empty() {
        named.insert("variables".into(), expand_parameters(&variables));
    }
    if let Some(c) = data.get_i64("concurrency") {
        named.insert("concurrency".into(), json!(c));
    }
    let annotations = data.get_string_list("annotations");
    if !annotations.is_empty() {
        named.insert("annotations".into(), expand_annotations(&annotations));
    }
    Ok(merge(PropertyBag::new(), named, &PropertyBag::new()))
}

pub fn absorb_properties(
    bag: PropertyBag,
    label: &str,
    data: &mut ResourceData,
) -> Result<Diagnostics> {
    let mut diags = Diagnostics::new();
    let mut proj = project(bag, FIELDS, label, &mut diags)?;

    if let Some(arr) = proj.take("activities") {
        let activities = deserialize_activities(&arr.to_string())
            .with_context(|| format!("field `activities` on {} {}: undecodable response", KIND, label))?;
        let encoded = serialize_activities(&activities)?;
        let keep = data
            .get_string("activities_json")
            .map(|old| json_equivalent(&old, &encoded))
            .unwrap_or(false);
        if !keep {
            data.set("activities_json", json!(encoded));
        }
    }
    if let Some(d) = proj.take_text("description") {
        data.set("description", json!(d));
    }
    if let Some(folder) = proj.take("folder") {
        if let Some(name) = flatten_folder(&folder) {
            data.set("folder", json!(name));
        }
    }
    if let Some(params) = proj.take("parameters") {
        let flat = flatten_parameters(&params, "parameters", &mut diags);
        data.set("parameters", serde_json::to_value(flat)?);
    }
    if let Some(vars) = proj.take("variables") {
        let flat = flatten_parameters(&vars, "variables", &mut diags);
        data.set("variables", serde_json::to_value(flat)?);
    }
    if let Some(c) = proj.take("concurrency").and_then(|v| v.as_i64()) {
        data.set("concurrency", json!(c));
    }
    data.set("annotations", json!(proj.take_text_list("annotations")));
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
    counter!("pipeline_apply_attempts", 1u64);
    if is_create {
        ensure_absent(client, Collection::Pipelines, id, KIND).await?;
    }
    let bag = build_properties(&id.to_string(), data)?;
    let env = Envelope::new(id.name.clone(), Value::Object(bag));
    let saved = client
        .create_or_update(Collection::Pipelines, id, env, None)
        .await
        .with_context(|| format!("creating {} {}", KIND, id))?;
    data.set_id(saved.id);
    counter!("pipeline_apply_ok", 1u64);
    Ok(())
}

pub async fn read(
    client: &dyn FactoryClient,
    id: &ResourceId,
    data: &mut ResourceData,
) -> Result<Diagnostics> {
    match client.get(Collection::Pipelines, id, None).await? {
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
        .delete(Collection::Pipelines, id)
        .await
        .with_context(|| format!("deleting {} {}", KIND, id))?;
    Ok(())
}
