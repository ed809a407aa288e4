use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tokio::sync::RwLock;

use super::{ClusterStore, ConfigDocument, DocumentKey};
use crate::crd::{ClusterClaim, ClusterClaimSpec, Feature, HelmRelease};
use crate::error::{SccError, StoreResult};

#[derive(Default)]
struct MemoryState {
    namespaces: HashMap<String, Namespace>,
    features: HashMap<String, Feature>,
    // keyed by "<namespace>/<name>"
    releases: HashMap<String, HelmRelease>,
    documents: HashMap<DocumentKey, StoredDocument>,
    claims: HashMap<String, ClusterClaim>,
    config_writes: usize,
}

struct StoredDocument {
    data: BTreeMap<String, String>,
    version: u64,
}

/// In-process [`ClusterStore`] with the same conflict semantics as the API
/// server: every write bumps a per-document version and conditional patches
/// against a stale version fail.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

fn release_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_namespace<'a>(
        &self,
        name: &str,
        annotations: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let annotations: BTreeMap<String, String> = annotations
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations: (!annotations.is_empty()).then_some(annotations),
                ..Default::default()
            },
            ..Default::default()
        };
        self.state
            .write()
            .await
            .namespaces
            .insert(name.to_string(), ns);
    }

    pub async fn has_namespace(&self, name: &str) -> bool {
        self.state.read().await.namespaces.contains_key(name)
    }

    pub async fn insert_feature(&self, feature: Feature) {
        self.state
            .write()
            .await
            .features
            .insert(feature.name_any(), feature);
    }

    pub async fn remove_feature(&self, name: &str) {
        self.state.write().await.features.remove(name);
    }

    pub async fn insert_release(&self, release: HelmRelease) {
        let ns = release.namespace().unwrap_or_default();
        let key = release_key(&ns, &release.name_any());
        self.state.write().await.releases.insert(key, release);
    }

    /// Current entries of a document, if it exists.
    pub async fn config_entries(
        &self,
        key: &DocumentKey,
    ) -> Option<BTreeMap<String, String>> {
        self.state
            .read()
            .await
            .documents
            .get(key)
            .map(|d| d.data.clone())
    }

    /// Number of successful document writes (creates and patches).
    pub async fn config_writes(&self) -> usize {
        self.state.read().await.config_writes
    }

    pub async fn cluster_claim_value(&self, name: &str) -> Option<String> {
        self.state
            .read()
            .await
            .claims
            .get(name)
            .map(|c| c.spec.value.clone())
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_namespace(&self, name: &str) -> StoreResult<Option<Namespace>> {
        Ok(self.state.read().await.namespaces.get(name).cloned())
    }

    async fn create_namespace(&self, name: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.namespaces.contains_key(name) {
            return Err(SccError::AlreadyExists(format!("namespace {name}")));
        }
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        state.namespaces.insert(name.to_string(), ns);
        Ok(())
    }

    async fn get_feature(&self, name: &str) -> StoreResult<Option<Feature>> {
        Ok(self.state.read().await.features.get(name).cloned())
    }

    async fn list_features(&self) -> StoreResult<Vec<Feature>> {
        let state = self.state.read().await;
        let mut list: Vec<Feature> = state.features.values().cloned().collect();
        list.sort_by_key(|f| f.name_any());
        Ok(list)
    }

    async fn get_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<HelmRelease>> {
        Ok(self
            .state
            .read()
            .await
            .releases
            .get(&release_key(namespace, name))
            .cloned())
    }

    async fn list_releases(&self) -> StoreResult<Vec<HelmRelease>> {
        let state = self.state.read().await;
        let mut list: Vec<HelmRelease> =
            state.releases.values().cloned().collect();
        list.sort_by_key(|r| (r.namespace(), r.name_any()));
        Ok(list)
    }

    async fn get_config_document(
        &self,
        key: &DocumentKey,
    ) -> StoreResult<Option<ConfigDocument>> {
        Ok(self.state.read().await.documents.get(key).map(|d| {
            ConfigDocument {
                data: d.data.clone(),
                resource_version: Some(d.version.to_string()),
            }
        }))
    }

    async fn create_config_document(
        &self,
        key: &DocumentKey,
        data: BTreeMap<String, String>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.documents.contains_key(key) {
            return Err(SccError::Conflict(key.to_string()));
        }
        state
            .documents
            .insert(key.clone(), StoredDocument { data, version: 1 });
        state.config_writes += 1;
        Ok(())
    }

    async fn patch_config_entry(
        &self,
        key: &DocumentKey,
        resource_version: &str,
        entry_key: &str,
        entry_value: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let doc = state
            .documents
            .get_mut(key)
            .ok_or_else(|| SccError::Conflict(key.to_string()))?;
        if doc.version.to_string() != resource_version {
            return Err(SccError::Conflict(key.to_string()));
        }
        doc.data
            .insert(entry_key.to_string(), entry_value.to_string());
        doc.version += 1;
        state.config_writes += 1;
        Ok(())
    }

    async fn get_cluster_claim(
        &self,
        name: &str,
    ) -> StoreResult<Option<ClusterClaim>> {
        Ok(self.state.read().await.claims.get(name).cloned())
    }

    async fn create_cluster_claim(
        &self,
        name: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.claims.contains_key(name) {
            return Err(SccError::Conflict(format!("clusterclaim {name}")));
        }
        let cc = ClusterClaim::new(
            name,
            ClusterClaimSpec {
                value: value.to_string(),
            },
        );
        state.claims.insert(name.to_string(), cc);
        Ok(())
    }

    async fn set_cluster_claim_value(
        &self,
        name: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let cc = state
            .claims
            .get_mut(name)
            .ok_or_else(|| SccError::NotFound(format!("clusterclaim {name}")))?;
        cc.spec.value = value.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentKey {
        DocumentKey::new("kubeops", "ace-openshift-scc")
    }

    #[tokio::test]
    async fn stale_patch_conflicts() {
        let store = MemoryStore::new();
        store
            .create_config_document(&doc(), BTreeMap::new())
            .await
            .unwrap();
        let read = store.get_config_document(&doc()).await.unwrap().unwrap();
        let rv = read.resource_version.unwrap();

        store.patch_config_entry(&doc(), &rv, "a.yaml", "{}").await.unwrap();
        let err = store
            .patch_config_entry(&doc(), &rv, "b.yaml", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, SccError::Conflict(_)));

        let entries = store.config_entries(&doc()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("a.yaml"));
    }

    #[tokio::test]
    async fn create_namespace_twice_reports_already_exists() {
        let store = MemoryStore::new();
        store.create_namespace("ace").await.unwrap();
        let err = store.create_namespace("ace").await.unwrap_err();
        assert!(matches!(err, SccError::AlreadyExists(_)));
    }
}
