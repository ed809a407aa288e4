//! Cluster object access used by the reconcilers.
//!
//! The reconcilers never talk to kube directly; they go through
//! [`ClusterStore`] so the same policy runs against the API server
//! ([`k8s::KubeStore`]) and against [`memory::MemoryStore`] in tests.

pub mod k8s;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;

use crate::crd::{ClusterClaim, Feature, HelmRelease};
use crate::error::StoreResult;

/// Location of a namespaced keyed document (a ConfigMap).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub namespace: String,
    pub name: String,
}

impl DocumentKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Snapshot of a keyed document as read from the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    pub data: BTreeMap<String, String>,
    /// Opaque version token; writes conditioned on it fail with `Conflict`
    /// once anyone else has written the document.
    pub resource_version: Option<String>,
}

#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_namespace(&self, name: &str) -> StoreResult<Option<Namespace>>;

    /// Fails with `AlreadyExists` when another writer got there first.
    async fn create_namespace(&self, name: &str) -> StoreResult<()>;

    async fn get_feature(&self, name: &str) -> StoreResult<Option<Feature>>;

    async fn list_features(&self) -> StoreResult<Vec<Feature>>;

    async fn get_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<HelmRelease>>;

    async fn list_releases(&self) -> StoreResult<Vec<HelmRelease>>;

    async fn get_config_document(
        &self,
        key: &DocumentKey,
    ) -> StoreResult<Option<ConfigDocument>>;

    /// Fails with `Conflict` if the document was created concurrently.
    async fn create_config_document(
        &self,
        key: &DocumentKey,
        data: BTreeMap<String, String>,
    ) -> StoreResult<()>;

    /// Sets a single entry, leaving every other key untouched. Fails with
    /// `Conflict` unless the stored version still equals `resource_version`.
    async fn patch_config_entry(
        &self,
        key: &DocumentKey,
        resource_version: &str,
        entry_key: &str,
        entry_value: &str,
    ) -> StoreResult<()>;

    async fn get_cluster_claim(
        &self,
        name: &str,
    ) -> StoreResult<Option<ClusterClaim>>;

    async fn create_cluster_claim(
        &self,
        name: &str,
        value: &str,
    ) -> StoreResult<()>;

    /// Overwrites `spec.value` unconditionally.
    async fn set_cluster_claim_value(
        &self,
        name: &str,
        value: &str,
    ) -> StoreResult<()>;
}
