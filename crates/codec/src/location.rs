//! Dataset location variants.
//!
//! On the wire each location is discriminated by its `type` tag, so the
//! whole one-of decodes in a single pass instead of probing shape by shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use adf_core::Diagnostics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DatasetLocation {
    #[serde(rename = "HttpServerLocation")]
    HttpServer {
        #[serde(rename = "relativeUrl", skip_serializing_if = "Option::is_none")]
        relative_url: Option<String>,
        #[serde(rename = "folderPath", skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    #[serde(rename = "AzureBlobStorageLocation")]
    AzureBlobStorage {
        container: String,
        #[serde(rename = "folderPath", skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    #[serde(rename = "AzureBlobFSLocation")]
    AzureBlobFs {
        #[serde(rename = "fileSystem")]
        file_system: String,
        #[serde(rename = "folderPath", skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    #[serde(rename = "SftpLocation")]
    Sftp {
        #[serde(rename = "folderPath", skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

impl DatasetLocation {
    /// Wire shape of this location, ready to sit under `typeProperties`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decode a wire-level location. Unknown tags or missing required
    /// fields flatten to `None` plus a diagnostic; reads never fail here.
    pub fn from_value(v: &Value, diags: &mut Diagnostics) -> Option<Self> {
        match serde_json::from_value::<Self>(v.clone()) {
            Ok(loc) => Some(loc),
            Err(e) => {
                diags.skip("location", format!("unrecognized location shape: {}", e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn each_variant_round_trips_with_its_own_tag() {
        let cases = vec![
            (
                DatasetLocation::HttpServer {
                    relative_url: Some("files/a.csv".into()),
                    path: None,
                    filename: None,
                },
                "HttpServerLocation",
            ),
            (
                DatasetLocation::AzureBlobStorage {
                    container: "raw".into(),
                    path: Some("in".into()),
                    filename: Some("a.bin".into()),
                },
                "AzureBlobStorageLocation",
            ),
            (
                DatasetLocation::AzureBlobFs {
                    file_system: "lake".into(),
                    path: None,
                    filename: Some("a.parquet".into()),
                },
                "AzureBlobFSLocation",
            ),
            (
                DatasetLocation::Sftp { path: Some("drop".into()), filename: None },
                "SftpLocation",
            ),
        ];
        for (loc, tag) in cases {
            let wire = loc.to_value();
            assert_eq!(wire["type"], json!(tag));
            // No foreign variant's fields may leak into the wire shape.
            let keys: Vec<&str> = wire.as_object().unwrap().keys().map(String::as_str).collect();
            for k in &keys {
                assert!(
                    ["type", "relativeUrl", "folderPath", "fileName", "container", "fileSystem"]
                        .contains(k),
                    "unexpected key {k}"
                );
            }
            let mut diags = Diagnostics::new();
            let back = DatasetLocation::from_value(&wire, &mut diags).unwrap();
            assert_eq!(back, loc);
            assert!(diags.is_empty());
        }
    }

    #[test]
    fn blob_storage_without_container_does_not_decode_as_sftp() {
        // Exclusivity: a shape missing its required field degrades to None
        // rather than sliding into a structurally-smaller variant.
        let wire = json!({"type": "AzureBlobStorageLocation", "folderPath": "in"});
        let mut diags = Diagnostics::new();
        assert!(DatasetLocation::from_value(&wire, &mut diags).is_none());
        assert!(diags.mentions("location"));
    }

    #[test]
    fn unknown_tag_flattens_to_none() {
        let wire = json!({"type": "GoogleCloudStorageLocation", "bucket": "b"});
        let mut diags = Diagnostics::new();
        assert!(DatasetLocation::from_value(&wire, &mut diags).is_none());
        assert_eq!(diags.len(), 1);
    }
}
