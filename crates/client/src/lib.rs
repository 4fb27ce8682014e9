//! Management-API boundary.
//!
//! The codec layer only ever sees the `properties` sub-object; everything
//! HTTP-shaped (auth, retries, paging) lives behind [`FactoryClient`]. An
//! absent resource is `Ok(None)` on `get`, never an error, so callers can
//! implement out-of-band-deletion semantics without matching on error
//! kinds.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

/// Sub-resource collections under a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Datasets,
    LinkedServices,
    Pipelines,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Datasets => "datasets",
            Self::LinkedServices => "linkedservices",
            Self::Pipelines => "pipelines",
        }
    }
}

/// Identity of a sub-resource: resource group / factory / name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub resource_group: String,
    pub factory_name: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(
        resource_group: impl Into<String>,
        factory_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            resource_group: resource_group.into(),
            factory_name: factory_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.resource_group, self.factory_name, self.name)
    }
}

/// Wire envelope: the resource body is always `{"properties": {...}}` plus
/// server-managed identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub properties: Value,
}

impl Envelope {
    pub fn new(name: impl Into<String>, properties: Value) -> Self {
        Self { id: None, name: name.into(), etag: None, properties }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("precondition failed for {0}: etag mismatch")]
    PreconditionFailed(String),
    #[error("api error: {0}")]
    Api(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

#[async_trait::async_trait]
pub trait FactoryClient: Send + Sync {
    /// Fetch a resource. `Ok(None)` means the resource does not exist.
    async fn get(
        &self,
        collection: Collection,
        id: &ResourceId,
        if_none_match: Option<&str>,
    ) -> ClientResult<Option<Envelope>>;

    /// Create or replace a resource; returns the stored envelope with its
    /// server-assigned id and eTag. `if_match` guards concurrent updates.
    async fn create_or_update(
        &self,
        collection: Collection,
        id: &ResourceId,
        body: Envelope,
        if_match: Option<&str>,
    ) -> ClientResult<Envelope>;

    /// Delete a resource. Deleting an absent resource is a no-op.
    async fn delete(&self, collection: Collection, id: &ResourceId) -> ClientResult<()>;
}

type StoreKey = (Collection, String, String, String);

/// In-memory stand-in for the remote service, used by tests and the CLI
/// smoke path. Mimics the API's envelope and eTag behavior.
#[derive(Default)]
pub struct InMemoryFactory {
    store: RwLock<HashMap<StoreKey, Envelope>>,
}

impl InMemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(collection: Collection, id: &ResourceId) -> StoreKey {
        (collection, id.resource_group.clone(), id.factory_name.clone(), id.name.clone())
    }

    fn arm_id(collection: Collection, id: &ResourceId) -> String {
        format!(
            "/resourceGroups/{}/providers/Microsoft.DataFactory/factories/{}/{}/{}",
            id.resource_group,
            id.factory_name,
            collection.as_str(),
            id.name
        )
    }
}

#[async_trait::async_trait]
impl FactoryClient for InMemoryFactory {
    async fn get(
        &self,
        collection: Collection,
        id: &ResourceId,
        _if_none_match: Option<&str>,
    ) -> ClientResult<Option<Envelope>> {
        let store = self.store.read().await;
        Ok(store.get(&Self::key(collection, id)).cloned())
    }

    async fn create_or_update(
        &self,
        collection: Collection,
        id: &ResourceId,
        mut body: Envelope,
        if_match: Option<&str>,
    ) -> ClientResult<Envelope> {
        let mut store = self.store.write().await;
        let key = Self::key(collection, id);
        if let Some(expected) = if_match {
            let current = store.get(&key).and_then(|e| e.etag.as_deref());
            if current != Some(expected) {
                return Err(ClientError::PreconditionFailed(id.to_string()));
            }
        }
        body.id = Some(Self::arm_id(collection, id));
        body.etag = Some(uuid::Uuid::new_v4().to_string());
        body.name = id.name.clone();
        debug!(collection = collection.as_str(), id = %id, "stored resource");
        store.insert(key, body.clone());
        Ok(body)
    }

    async fn delete(&self, collection: Collection, id: &ResourceId) -> ClientResult<()> {
        let mut store = self.store.write().await;
        store.remove(&Self::key(collection, id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id() -> ResourceId {
        ResourceId::new("rg", "factory1", "thing")
    }

    #[tokio::test]
    async fn get_absent_is_none_not_error() {
        let client = InMemoryFactory::new();
        let got = client.get(Collection::Datasets, &id(), None).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn create_assigns_id_and_etag() {
        let client = InMemoryFactory::new();
        let env = Envelope::new("thing", json!({"type": "Binary"}));
        let saved = client.create_or_update(Collection::Datasets, &id(), env, None).await.unwrap();
        assert!(saved.etag.is_some());
        assert!(saved.id.as_deref().unwrap().ends_with("/datasets/thing"));

        let fetched = client.get(Collection::Datasets, &id(), None).await.unwrap().unwrap();
        assert_eq!(fetched, saved);
    }

    #[tokio::test]
    async fn etag_rotates_on_update_and_guards_writes() {
        let client = InMemoryFactory::new();
        let first = client
            .create_or_update(Collection::Pipelines, &id(), Envelope::new("thing", json!({})), None)
            .await
            .unwrap();
        let second = client
            .create_or_update(
                Collection::Pipelines,
                &id(),
                Envelope::new("thing", json!({})),
                first.etag.as_deref(),
            )
            .await
            .unwrap();
        assert_ne!(first.etag, second.etag);

        let stale = client
            .create_or_update(
                Collection::Pipelines,
                &id(),
                Envelope::new("thing", json!({})),
                first.etag.as_deref(),
            )
            .await;
        assert!(matches!(stale, Err(ClientError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let client = InMemoryFactory::new();
        client.delete(Collection::LinkedServices, &id()).await.unwrap();
        client
            .create_or_update(Collection::LinkedServices, &id(), Envelope::new("thing", json!({})), None)
            .await
            .unwrap();
        client.delete(Collection::LinkedServices, &id()).await.unwrap();
        assert!(client.get(Collection::LinkedServices, &id(), None).await.unwrap().is_none());
    }

    #[test]
    fn collections_are_scoped_separately() {
        // Same name in two collections must not collide in the key space.
        let a = InMemoryFactory::key(Collection::Datasets, &id());
        let b = InMemoryFactory::key(Collection::Pipelines, &id());
        assert_ne!(a, b);
    }

    #[test]
    fn envelope_serializes_properties_member() {
        let env = Envelope::new("n", json!({"type": "Binary"}));
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["properties"]["type"], json!("Binary"));
        assert!(v.get("etag").is_none());
    }
}
