//! Custom dataset: like the custom linked service, but anchored to a
//! linked service reference and optionally carrying a raw `schema_json`.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use serde_json::{json, Value};

use adf_client::{Collection, Envelope, FactoryClient, ResourceId};
use adf_codec::{
    expand_annotations, expand_folder, expand_parameters, flatten_folder, flatten_parameters,
    merge, project, NamedField,
};
use adf_core::{canonical_json, json_equivalent, Diagnostics, PropertyBag};

use crate::{ensure_absent, linked_service_reference, string_map_to_bag, ResourceData};

const KIND: &str = "custom dataset";

const FIELDS: &[NamedField] = &[
    NamedField::text("type"),
    NamedField::any("typeProperties"),
    NamedField::any("schema"),
    NamedField::object("linkedServiceName"),
    NamedField::text("description"),
    NamedField::object("folder"),
    NamedField::object("parameters"),
    NamedField::text_list("annotations"),
];

// The reference sub-object gets its own projection: its parameters are a
// plain string map on the wire, unlike the spec-shaped top-level ones.
const REFERENCE_FIELDS: &[NamedField] = &[
    NamedField::text("referenceName"),
    NamedField::text("type"),
    NamedField::text_map("parameters"),
];

pub fn build_properties(label: &str, data: &ResourceData) -> Result<PropertyBag> {
    let ty = data
        .get_string("type")
        .ok_or_else(|| anyhow!("field `type` on {} {}: required", KIND, label))?;
    let raw = data
        .get_string("type_properties_json")
        .ok_or_else(|| anyhow!("field `type_properties_json` on {} {}: required", KIND, label))?;
    let type_properties: Value = serde_json::from_str(&raw)
        .with_context(|| format!("field `type_properties_json` on {} {}: invalid JSON", KIND, label))?;
    let ls_name = data
        .get_string("linked_service_name")
        .ok_or_else(|| anyhow!("field `linked_service_name` on {} {}: required", KIND, label))?;

    let mut named = PropertyBag::new();
    named.insert("type".into(), json!(ty));
    named.insert("typeProperties".into(), type_properties);
    named.insert(
        "linkedServiceName".into(),
        linked_service_reference(&ls_name, &data.get_string_map("linked_service_parameters")),
    );
    if let Some(raw) = data.get_string("schema_json") {
        let schema: Value = serde_json::from_str(&raw)
            .with_context(|| format!("field `schema_json` on {} {}: invalid JSON", KIND, label))?;
        named.insert("schema".into(), schema);
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
    let annotations = data.get_string_list("annotations");
    if !annotations.is_empty() {
        named.insert("annotations".into(), expand_annotations(&annotations));
    }

    let extra = string_map_to_bag(data.get_string_map("additional_properties"));
    Ok(merge(PropertyBag::new(), named, &extra))
}

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
        let keep = data
            .get_string("type_properties_json")
            .map(|old| json_equivalent(&old, &canonical))
            .unwrap_or(false);
        if !keep {
            data.set("type_properties_json", json!(canonical));
        }
    }
    if let Some(schema) = proj.take("schema") {
        let canonical = canonical_json(&schema);
        let keep = data
            .get_string("schema_json")
            .map(|old| json_equivalent(&old, &canonical))
            .unwrap_or(false);
        if !keep {
            data.set("schema_json", json!(canonical));
        }
    }
    if let Some(Value::Object(reference)) = proj.take("linkedServiceName") {
        let mut ls = project(reference, REFERENCE_FIELDS, label, &mut diags)?;
        if let Some(name) = ls.take_text("referenceName") {
            data.set("linked_service_name", json!(name));
        }
        let params = ls.take_text_map("parameters");
        if !params.is_empty() {
            data.set("linked_service_parameters", serde_json::to_value(params)?);
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

#[cfg(test)]
mod tests {
    use super::*;
    use adf_client::InMemoryFactory;
    use serde_json::json;

    fn id() -> ResourceId {
        ResourceId::new("rg", "factory1", "ds1")
    }

    fn config() -> ResourceData {
        ResourceData::from_json(json!({
            "type": "Json",
            "type_properties_json": "{\"location\":{\"type\":\"AzureBlobStorageLocation\",\"container\":\"raw\"}}",
            "linked_service_name": "blob",
            "linked_service_parameters": {"container": "raw"},
            "schema_json": "{\"type\":\"object\"}",
            "description": "events feed",
            "folder": "ingest",
            "parameters": {"env": "prod"},
            "annotations": ["gold"]
        }))
        .unwrap()
    }

    #[test]
    fn build_includes_reference_and_folder() {
        let bag = build_properties("ds1", &config()).unwrap();
        assert_eq!(bag["linkedServiceName"]["referenceName"], json!("blob"));
        assert_eq!(bag["folder"], json!({"name": "ingest"}));
        assert_eq!(bag["parameters"]["env"]["defaultValue"], json!("prod"));
        assert_eq!(bag["schema"], json!({"type": "object"}));
    }

    #[test]
    fn missing_linked_service_is_an_error() {
        let mut data = config();
        data.set("linked_service_name", json!(""));
        let err = build_properties("ds1", &data).unwrap_err().to_string();
        assert!(err.contains("`linked_service_name`"), "{err}");
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let client = InMemoryFactory::new();
        let mut data = config();
        create(&client, &id(), &mut data).await.unwrap();

        let mut fresh = ResourceData::new();
        let diags = read(&client, &id(), &mut fresh).await.unwrap();
        assert!(diags.is_empty());
        assert_eq!(fresh.get_string("type").as_deref(), Some("Json"));
        assert_eq!(fresh.get_string("linked_service_name").as_deref(), Some("blob"));
        assert_eq!(fresh.get("linked_service_parameters"), Some(&json!({"container": "raw"})));
        assert_eq!(fresh.get_string("folder").as_deref(), Some("ingest"));
        assert_eq!(fresh.get("parameters"), Some(&json!({"env": "prod"})));
        assert_eq!(fresh.get_string_list("annotations"), vec!["gold"]);
        assert!(json_equivalent(
            &fresh.get_string("schema_json").unwrap(),
            "{\"type\":\"object\"}"
        ));
    }

    #[tokio::test]
    async fn non_string_reference_parameters_are_skipped() {
        let client = InMemoryFactory::new();
        let env = Envelope::new(
            "ds1",
            json!({
                "type": "Json",
                "typeProperties": {},
                "linkedServiceName": {
                    "referenceName": "blob",
                    "type": "LinkedServiceReference",
                    "parameters": {"container": "raw", "depth": 3}
                }
            }),
        );
        client.create_or_update(Collection::Datasets, &id(), env, None).await.unwrap();
        let mut data = ResourceData::new();
        let diags = read(&client, &id(), &mut data).await.unwrap();
        assert!(diags.mentions("parameters"));
        assert_eq!(data.get("linked_service_parameters"), Some(&json!({"container": "raw"})));
    }

    #[tokio::test]
    async fn bad_parameter_from_api_degrades_not_fails() {
        let client = InMemoryFactory::new();
        let env = Envelope::new(
            "ds1",
            json!({
                "type": "Json",
                "typeProperties": {},
                "linkedServiceName": {"referenceName": "blob", "type": "LinkedServiceReference"},
                "parameters": {
                    "good": {"type": "String", "defaultValue": "x"},
                    "bad": {"type": "Array", "defaultValue": [1]}
                }
            }),
        );
        client.create_or_update(Collection::Datasets, &id(), env, None).await.unwrap();
        let mut data = ResourceData::new();
        let diags = read(&client, &id(), &mut data).await.unwrap();
        assert!(diags.mentions("parameters"));
        assert_eq!(data.get("parameters"), Some(&json!({"good": "x"})));
    }
}
