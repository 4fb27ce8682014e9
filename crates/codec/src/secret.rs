//! Secret references: plain secure strings vs key-vault lookups.
//!
//! A value is a key-vault reference exactly when it carries a `type` key
//! whose value is not `"SecureString"`.

use serde_json::{json, Value};

use adf_core::Diagnostics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretReference {
    SecureString(String),
    KeyVault { secret_name: String, linked_service_name: String },
}

pub fn expand_secret(secret: &SecretReference) -> Value {
    match secret {
        SecretReference::SecureString(v) => json!({"type": "SecureString", "value": v}),
        SecretReference::KeyVault { secret_name, linked_service_name } => json!({
            "type": "AzureKeyVaultSecret",
            "secretName": secret_name,
            "store": {
                "referenceName": linked_service_name,
                "type": "LinkedServiceReference"
            }
        }),
    }
}

/// Inverse of [`expand_secret`]. Malformed references flatten to `None`
/// with a diagnostic.
pub fn flatten_secret(v: &Value, diags: &mut Diagnostics) -> Option<SecretReference> {
    let tag = v.get("type").and_then(Value::as_str);
    match tag {
        None | Some("SecureString") => match v.get("value").and_then(Value::as_str) {
            Some(s) => Some(SecretReference::SecureString(s.to_string())),
            None => {
                diags.skip("secret", "secure string without a string `value`");
                None
            }
        },
        Some(_) => {
            let secret_name = v.get("secretName").and_then(Value::as_str);
            let store = v.get("store").and_then(|s| s.get("referenceName")).and_then(Value::as_str);
            match (secret_name, store) {
                (Some(name), Some(store)) => Some(SecretReference::KeyVault {
                    secret_name: name.to_string(),
                    linked_service_name: store.to_string(),
                }),
                _ => {
                    diags.skip("secret", "key vault reference missing secretName or store");
                    None
                }
            }
        }
    }
}
