//! Pipeline activities: a type-tag discriminated model plus the codec for
//! the bare `activities_json` array.
//!
//! The array is never parsed directly: it is wrapped in a synthetic
//! `{"activities": [...]}` envelope, decoded through the object-level
//! machinery, and unwrapped again. Serialization is the inverse.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use adf_core::PropertyBag;

/// The activity types the decoder recognizes. An element whose `type` tag
/// is not in this set is a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    AppendVariable,
    AzureFunction,
    Copy,
    DatabricksNotebook,
    Delete,
    ExecuteDataFlow,
    ExecutePipeline,
    Filter,
    ForEach,
    GetMetadata,
    IfCondition,
    Lookup,
    Script,
    SetVariable,
    SqlServerStoredProcedure,
    Until,
    Validation,
    Wait,
    Web,
    WebHook,
}

impl ActivityKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::AppendVariable => "AppendVariable",
            Self::AzureFunction => "AzureFunctionActivity",
            Self::Copy => "Copy",
            Self::DatabricksNotebook => "DatabricksNotebook",
            Self::Delete => "Delete",
            Self::ExecuteDataFlow => "ExecuteDataFlow",
            Self::ExecutePipeline => "ExecutePipeline",
            Self::Filter => "Filter",
            Self::ForEach => "ForEach",
            Self::GetMetadata => "GetMetadata",
            Self::IfCondition => "IfCondition",
            Self::Lookup => "Lookup",
            Self::Script => "Script",
            Self::SetVariable => "SetVariable",
            Self::SqlServerStoredProcedure => "SqlServerStoredProcedure",
            Self::Until => "Until",
            Self::Validation => "Validation",
            Self::Wait => "Wait",
            Self::Web => "WebActivity",
            Self::WebHook => "WebHook",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "AppendVariable" => Self::AppendVariable,
            "AzureFunctionActivity" => Self::AzureFunction,
            "Copy" => Self::Copy,
            "DatabricksNotebook" => Self::DatabricksNotebook,
            "Delete" => Self::Delete,
            "ExecuteDataFlow" => Self::ExecuteDataFlow,
            "ExecutePipeline" => Self::ExecutePipeline,
            "Filter" => Self::Filter,
            "ForEach" => Self::ForEach,
            "GetMetadata" => Self::GetMetadata,
            "IfCondition" => Self::IfCondition,
            "Lookup" => Self::Lookup,
            "Script" => Self::Script,
            "SetVariable" => Self::SetVariable,
            "SqlServerStoredProcedure" => Self::SqlServerStoredProcedure,
            "Until" => Self::Until,
            "Validation" => Self::Validation,
            "Wait" => Self::Wait,
            "WebActivity" => Self::Web,
            "WebHook" => Self::WebHook,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDependency {
    pub activity: String,
    #[serde(rename = "dependencyConditions")]
    pub dependency_conditions: Vec<String>,
}

/// One pipeline activity.
///
/// The decoder is deliberately shallow: beyond the shared header fields,
/// `typeProperties` stays raw JSON and every member it does not model ends
/// up in `additional`, so an array survives a decode/encode cycle
/// JSON-equivalent even when it uses features this model never heard of.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub name: String,
    pub description: Option<String>,
    pub depends_on: Vec<ActivityDependency>,
    pub type_properties: Option<Value>,
    pub additional: PropertyBag,
}

impl Activity {
    pub fn new(kind: ActivityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: None,
            depends_on: Vec::new(),
            type_properties: None,
            additional: PropertyBag::new(),
        }
    }
}

impl<'de> Deserialize<'de> for Activity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut bag = PropertyBag::deserialize(deserializer)?;
        let tag = match bag.remove("type") {
            Some(Value::String(t)) => t,
            Some(_) => return Err(D::Error::custom("activity `type` tag must be a string")),
            None => return Err(D::Error::custom("activity missing `type` tag")),
        };
        let kind = ActivityKind::from_tag(&tag)
            .ok_or_else(|| D::Error::custom(format!("unknown activity type `{}`", tag)))?;
        let name = match bag.remove("name") {
            Some(Value::String(n)) => n,
            _ => return Err(D::Error::custom(format!("activity of type `{}` missing `name`", tag))),
        };
        let description = match bag.remove("description") {
            None => None,
            Some(Value::String(d)) => Some(d),
            Some(_) => return Err(D::Error::custom(format!("activity `{}`: description must be a string", name))),
        };
        let depends_on = match bag.remove("dependsOn") {
            None => Vec::new(),
            Some(v) => serde_json::from_value(v)
                .map_err(|e| D::Error::custom(format!("activity `{}`: bad dependsOn: {}", name, e)))?,
        };
        let type_properties = bag.remove("typeProperties");
        Ok(Activity { kind, name, description, depends_on, type_properties, additional: bag })
    }
}

impl Serialize for Activity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Start from the additional bag so the modeled fields below always
        // win on a key collision.
        let mut out = self.additional.clone();
        out.insert("type".into(), Value::String(self.kind.as_tag().to_string()));
        out.insert("name".into(), Value::String(self.name.clone()));
        if let Some(d) = &self.description {
            out.insert("description".into(), Value::String(d.clone()));
        }
        if !self.depends_on.is_empty() {
            let deps = serde_json::to_value(&self.depends_on).map_err(serde::ser::Error::custom)?;
            out.insert("dependsOn".into(), deps);
        }
        if let Some(tp) = &self.type_properties {
            out.insert("typeProperties".into(), tp.clone());
        }
        out.serialize(serializer)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ActivityEnvelope {
    activities: Vec<Activity>,
}

/// Decode a bare JSON array of activities.
///
/// Fails when the input is not a JSON array, an element is missing its
/// header fields, or a `type` tag is unrecognized.
pub fn deserialize_activities(raw: &str) -> Result<Vec<Activity>> {
    let wrapped = format!("{{\"activities\": {}}}", raw);
    let env: ActivityEnvelope =
        serde_json::from_str(&wrapped).context("parsing activities JSON array")?;
    Ok(env.activities)
}

/// Inverse of [`deserialize_activities`]: encode through the same envelope
/// and hand back just the array's JSON text.
pub fn serialize_activities(activities: &[Activity]) -> Result<String> {
    let env = ActivityEnvelope { activities: activities.to_vec() };
    let value = serde_json::to_value(&env).context("encoding activities")?;
    let arr = value.get("activities").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
    serde_json::to_string(&arr).context("encoding activities JSON array")
}

#[cfg(test)]
mod tests {
    use super::*;
    use adf_core::json_equivalent;
    use serde_json::json;

    const SAMPLE: &str = r#"[
        {
            "name": "wait-a-bit",
            "type": "Wait",
            "typeProperties": {"waitTimeInSeconds": 30}
        },
        {
            "name": "run-child",
            "type": "ExecutePipeline",
            "description": "kick off the child pipeline",
            "dependsOn": [
                {"activity": "wait-a-bit", "dependencyConditions": ["Succeeded"]}
            ],
            "policy": {"timeout": "0.00:10:00", "retry": 2},
            "userProperties": [{"name": "owner", "value": "ingest"}],
            "typeProperties": {
                "pipeline": {"referenceName": "child", "type": "PipelineReference"},
                "waitOnCompletion": true
            }
        },
        {
            "name": "loop",
            "type": "ForEach",
            "typeProperties": {
                "items": "@pipeline().parameters.files",
                "activities": [
                    {"name": "inner", "type": "Lookup", "typeProperties": {"source": {"type": "JsonSource"}}}
                ]
            }
        }
    ]"#;

    #[test]
    fn round_trip_is_json_equivalent() {
        let activities = deserialize_activities(SAMPLE).unwrap();
        assert_eq!(activities.len(), 3);
        let out = serialize_activities(&activities).unwrap();
        assert!(json_equivalent(SAMPLE, &out), "round trip changed the document: {out}");
    }

    #[test]
    fn header_fields_are_lifted_and_extras_preserved() {
        let activities = deserialize_activities(SAMPLE).unwrap();
        let exec = &activities[1];
        assert_eq!(exec.kind, ActivityKind::ExecutePipeline);
        assert_eq!(exec.name, "run-child");
        assert_eq!(exec.description.as_deref(), Some("kick off the child pipeline"));
        assert_eq!(exec.depends_on[0].activity, "wait-a-bit");
        assert!(exec.additional.contains_key("policy"));
        assert!(exec.additional.contains_key("userProperties"));
        // Nested activities stay raw JSON; the decoder is not recursive.
        let loop_tp = activities[2].type_properties.as_ref().unwrap();
        assert_eq!(loop_tp["activities"][0]["type"], json!("Lookup"));
    }

    #[test]
    fn object_input_is_not_an_activity_array() {
        assert!(deserialize_activities("{}").is_err());
    }

    #[test]
    fn invalid_json_errors() {
        assert!(deserialize_activities("[{").is_err());
    }

    #[test]
    fn unknown_type_tag_errors() {
        let raw = r#"[{"name": "x", "type": "TeleportActivity"}]"#;
        let err = deserialize_activities(raw).unwrap_err();
        assert!(format!("{err:#}").contains("unknown activity type"), "{err:#}");
    }

    #[test]
    fn missing_name_errors() {
        let raw = r#"[{"type": "Wait"}]"#;
        assert!(deserialize_activities(raw).is_err());
    }

    #[test]
    fn modeled_fields_win_over_stray_duplicates_in_additional() {
        let mut a = Activity::new(ActivityKind::Wait, "w");
        a.additional.insert("name".into(), json!("stale"));
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["name"], json!("w"));
    }

    #[test]
    fn empty_array_round_trips() {
        let acts = deserialize_activities("[]").unwrap();
        assert!(acts.is_empty());
        assert_eq!(serialize_activities(&acts).unwrap(), "[]");
    }
}
