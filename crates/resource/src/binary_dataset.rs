//! Binary dataset: a typed dataset whose `typeProperties` holds a location
//! variant and an optional compression variant.

use anyhow::{anyhow, bail, Context, Result};
use metrics::counter;
use serde_json::{json, Value};

use adf_client::{Collection, Envelope, FactoryClient, ResourceId};
use adf_codec::{
    expand_annotations, expand_compression, expand_folder, expand_parameters, flatten_compression,
    flatten_folder, flatten_parameters, merge, project, DatasetCompression, DatasetLocation,
    NamedField,
};
use adf_core::{Diagnostics, PropertyBag};

use crate::{ensure_absent, linked_service_reference, ResourceData};

const KIND: &str = "binary dataset";

const FIELDS: &[NamedField] = &[
    NamedField::text("type"),
    NamedField::object("typeProperties"),
    NamedField::object("linkedServiceName"),
    NamedField::text("description"),
    NamedField::object("folder"),
    NamedField::object("parameters"),
    NamedField::text_list("annotations"),
];

fn compression_from_config(v: &Value, label: &str) -> Result<DatasetCompression> {
    let mut probe = Diagnostics::new();
    flatten_compression(v, &mut probe).ok_or_else(|| {
        anyhow!("field `compression` on {} {}: unrecognized compression block", KIND, label)
    })
}

pub fn build_properties(label: &str, data: &ResourceData) -> Result<PropertyBag> {
    let ls_name = data
        .get_string("linked_service_name")
        .ok_or_else(|| anyhow!("field `linked_service_name` on {} {}: required", KIND, label))?;
    let loc_value = data
        .get_ok("location")
        .ok_or_else(|| anyhow!("field `location` on {} {}: required", KIND, label))?;
    let location: DatasetLocation = serde_json::from_value(loc_value.clone())
        .with_context(|| format!("field `location` on {} {}: not a known location variant", KIND, label))?;

    let mut type_properties = PropertyBag::new();
    type_properties.insert("location".into(), location.to_value());
    if let Some(comp) = data.get_ok("compression") {
        let compression = compression_from_config(comp, label)?;
        type_properties.insert("compression".into(), expand_compression(&compression));
    }

    let mut named = PropertyBag::new();
    named.insert("type".into(), json!("Binary"));
    named.insert("typeProperties".into(), Value::Object(type_properties));
    named.insert(
        "linkedServiceName".into(),
        linked_service_reference(&ls_name, &data.get_string_map("linked_service_parameters")),
    );
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

    if let Some(ty) = proj.take_text("type") {
        if ty != "Binary" {
            bail!("{} {}: unexpected dataset type `{}`", KIND, label, ty);
        }
    }
    if let Some(tp) = proj.take("typeProperties") {
        match tp.get("location") {
            Some(loc) => {
                if let Some(location) = DatasetLocation::from_value(loc, &mut diags) {
                    data.set("location", location.to_value());
                }
            }
            None => diags.skip("location", "typeProperties without a location"),
        }
        if let Some(comp) = tp.get("compression") {
            match flatten_compression(comp, &mut diags) {
                Some(compression) => data.set("compression", expand_compression(&compression)),
                None => data.set("compression", Value::Null),
            }
        }
    }
    if let Some(reference) = proj.take("linkedServiceName") {
        if let Some(name) = reference.get("referenceName").and_then(Value::as_str) {
            data.set("linked_service_name", json!(name));
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
    counter!("dataset_apply_attempts", 1u64);
    if is_create {
        ensure_absent(client, Collection::Datasets, id, KIND).await?;
    }
    let bag = build_properties(&id.to_string(), data)?;
    let env = Envelope::new(id.name.clone(), Value::Object(bag));
    let saved = client
        .create_or_update(Collection::Datasets, id, env, None)
        .await
        .with_context(|| format!("creating {} {}", KIND, id))?;
    data.set_id(saved.id);
    counter!("dataset_apply_ok", 1u64);
    Ok(())
}

pub async fn read(
    client: &dyn FactoryClient,
    id: &ResourceId,
    data: &mut ResourceData,
) -> Result<Diagnostics> {
    match client.get(Collection::Datasets, id, None).await? {
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
        .delete(Collection::Datasets, id)
        .await
        .with_context(|| format!("deleting {} {}", KIND, id))?;
    Ok(())
}
