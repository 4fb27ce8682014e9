//! Azure SQL linked service: carries a connection string (with one-sided
//! password diff suppression) and an optional key-vault password block.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use serde_json::{json, Value};

use adf_client::{Collection, Envelope, FactoryClient, ResourceId};
use adf_codec::{
    connection_strings_equivalent, expand_annotations, expand_parameters, expand_secret,
    flatten_parameters, flatten_secret, merge, project, NamedField, SecretReference,
};
use adf_core::{Diagnostics, PropertyBag};

use crate::{ensure_absent, ResourceData};

const KIND: &str = "SQL linked service";

const FIELDS: &[NamedField] = &[
    NamedField::text("type"),
    NamedField::object("typeProperties"),
    NamedField::text("description"),
    NamedField::object("parameters"),
    NamedField::text_list("annotations"),
];

pub fn build_properties(label: &str, data: &ResourceData) -> Result<PropertyBag> {
    let connection_string = data
        .get_string("connection_string")
        .ok_or_else(|| anyhow!("field `connection_string` on {} {}: required", KIND, label))?;

    let mut type_properties = PropertyBag::new();
    type_properties.insert("connectionString".into(), json!(connection_string));
    if let Some(kv) = data.get_ok("key_vault_password") {
        let secret_name = kv
            .get("secret_name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("field `key_vault_password.secret_name` on {} {}: required", KIND, label))?;
        let store = kv
            .get("linked_service_name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                anyhow!("field `key_vault_password.linked_service_name` on {} {}: required", KIND, label)
            })?;
        let secret = SecretReference::KeyVault {
            secret_name: secret_name.to_string(),
            linked_service_name: store.to_string(),
        };
        type_properties.insert("password".into(), expand_secret(&secret));
    }

    let mut named = PropertyBag::new();
    named.insert("type".into(), json!("AzureSqlDatabase"));
    named.insert("typeProperties".into(), Value::Object(type_properties));
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
    Ok(merge(PropertyBag::new(), named, &PropertyBag::new()))
}

pub fn absorb_properties(
    bag: PropertyBag,
    label: &str,
    data: &mut ResourceData,
) -> Result<Diagnostics> {
    let mut diags = Diagnostics::new();
    let mut proj = project(bag, FIELDS, label, &mut diags)?;

    if let Some(tp) = proj.take("typeProperties") {
        if let Some(remote) = tp.get("connectionString").and_then(Value::as_str) {
            // The API never echoes the password back; keep the configured
            // string when it only differs by its password token.
            let keep = data
                .get_string("connection_string")
                .map(|configured| connection_strings_equivalent(remote, &configured))
                .unwrap_or(false);
            if !keep {
                data.set("connection_string", json!(remote));
            }
        }
        if let Some(password) = tp.get("password") {
            match flatten_secret(password, &mut diags) {
                Some(SecretReference::KeyVault { secret_name, linked_service_name }) => {
                    data.set(
                        "key_vault_password",
                        json!({
                            "secret_name": secret_name,
                            "linked_service_name": linked_service_name
                        }),
                    );
                }
                // Secure-string passwords are write-only; nothing to store.
                Some(SecretReference::SecureString(_)) | None => {}
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use adf_client::InMemoryFactory;
    use serde_json::json;

    const CONFIGURED: &str =
        "Integrated Security=False;Data Source=test;Initial Catalog=test;User ID=test;Password=test";
    const ECHOED: &str =
        "Integrated Security=False;Data Source=test;Initial Catalog=test;User ID=test";

    fn id() -> ResourceId {
        ResourceId::new("rg", "factory1", "sql1")
    }

    fn config() -> ResourceData {
        ResourceData::from_json(json!({
            "connection_string": CONFIGURED,
            "key_vault_password": {"secret_name": "db-password", "linked_service_name": "kv"}
        }))
        .unwrap()
    }

    #[test]
    fn build_nests_connection_string_and_password() {
        let bag = build_properties("sql1", &config()).unwrap();
        assert_eq!(bag["type"], json!("AzureSqlDatabase"));
        assert_eq!(bag["typeProperties"]["connectionString"], json!(CONFIGURED));
        assert_eq!(bag["typeProperties"]["password"]["type"], json!("AzureKeyVaultSecret"));
        assert_eq!(bag["typeProperties"]["password"]["store"]["referenceName"], json!("kv"));
    }

    #[test]
    fn incomplete_key_vault_block_is_an_error() {
        let mut data = config();
        data.set("key_vault_password", json!({"secret_name": "db-password"}));
        let err = build_properties("sql1", &data).unwrap_err().to_string();
        assert!(err.contains("linked_service_name"), "{err}");
    }

    #[tokio::test]
    async fn password_stripped_echo_does_not_overwrite_config() {
        let client = InMemoryFactory::new();
        // Simulate the API echoing the connection string without its
        // password component.
        let env = Envelope::new(
            "sql1",
            json!({
                "type": "AzureSqlDatabase",
                "typeProperties": {"connectionString": ECHOED}
            }),
        );
        client.create_or_update(Collection::LinkedServices, &id(), env, None).await.unwrap();

        let mut data = config();
        read(&client, &id(), &mut data).await.unwrap();
        assert_eq!(data.get_string("connection_string").as_deref(), Some(CONFIGURED));
    }

    #[tokio::test]
    async fn real_connection_change_is_not_suppressed() {
        let client = InMemoryFactory::new();
        let env = Envelope::new(
            "sql1",
            json!({
                "type": "AzureSqlDatabase",
                "typeProperties": {
                    "connectionString": "Integrated Security=False;Data Source=test2;Initial Catalog=test;User ID=test"
                }
            }),
        );
        client.create_or_update(Collection::LinkedServices, &id(), env, None).await.unwrap();

        let mut data = config();
        read(&client, &id(), &mut data).await.unwrap();
        assert!(data.get_string("connection_string").unwrap().contains("test2"));
    }

    #[tokio::test]
    async fn key_vault_password_round_trips() {
        let client = InMemoryFactory::new();
        let mut data = config();
        create(&client, &id(), &mut data).await.unwrap();

        let mut fresh = ResourceData::new();
        let diags = read(&client, &id(), &mut fresh).await.unwrap();
        assert!(diags.is_empty());
        assert_eq!(
            fresh.get("key_vault_password"),
            Some(&json!({"secret_name": "db-password", "linked_service_name": "kv"}))
        );
    }
}
