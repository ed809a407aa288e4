#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use oprc_scc::config::SccConfig;
use oprc_scc::controller::ControllerContext;
use oprc_scc::crd::{
    ChartInfo, ClusterClaim, Feature, FeatureSpec, HelmRelease, HelmReleaseSpec,
};
use oprc_scc::error::StoreResult;
use oprc_scc::identity::{KEY_FS_GROUP, KEY_UID};
use oprc_scc::store::memory::MemoryStore;
use oprc_scc::store::{ClusterStore, ConfigDocument, DocumentKey};

pub fn feature(name: &str, feature_set: &str, chart_ns: &str) -> Feature {
    Feature::new(
        name,
        FeatureSpec {
            feature_set: feature_set.into(),
            chart: ChartInfo {
                name: name.into(),
                namespace: chart_ns.into(),
                ..Default::default()
            },
            ..Default::default()
        },
    )
}

pub fn release(ns: &str, name: &str, target: Option<&str>) -> HelmRelease {
    let mut hr = HelmRelease::new(
        name,
        HelmReleaseSpec {
            target_namespace: target.map(str::to_string),
            ..Default::default()
        },
    );
    hr.metadata.namespace = Some(ns.into());
    hr
}

/// Namespace carrying both SCC annotations with the same range.
pub async fn assigned_namespace(store: &MemoryStore, name: &str, range: &str) {
    store
        .insert_namespace(name, [(KEY_UID, range), (KEY_FS_GROUP, range)])
        .await;
}

pub fn context(store: &MemoryStore) -> ControllerContext<MemoryStore> {
    ControllerContext::new(store.clone(), SccConfig::default())
}

/// Wraps a [`MemoryStore`] and lands one foreign entry write right after the
/// next document read, so the reader's own write races and loses.
pub struct RacingStore {
    pub inner: MemoryStore,
    pending: Mutex<Option<(String, String)>>,
    /// Report documents without a resourceVersion.
    pub hide_version: bool,
}

impl RacingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
            hide_version: false,
        }
    }

    pub fn race_next_read(&self, entry_key: &str, entry_value: &str) {
        *self.pending.lock().unwrap() =
            Some((entry_key.to_string(), entry_value.to_string()));
    }
}

#[async_trait]
impl ClusterStore for RacingStore {
    async fn get_namespace(&self, name: &str) -> StoreResult<Option<Namespace>> {
        self.inner.get_namespace(name).await
    }

    async fn create_namespace(&self, name: &str) -> StoreResult<()> {
        self.inner.create_namespace(name).await
    }

    async fn get_feature(&self, name: &str) -> StoreResult<Option<Feature>> {
        self.inner.get_feature(name).await
    }

    async fn list_features(&self) -> StoreResult<Vec<Feature>> {
        self.inner.list_features().await
    }

    async fn get_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<HelmRelease>> {
        self.inner.get_release(namespace, name).await
    }

    async fn list_releases(&self) -> StoreResult<Vec<HelmRelease>> {
        self.inner.list_releases().await
    }

    async fn get_config_document(
        &self,
        key: &DocumentKey,
    ) -> StoreResult<Option<ConfigDocument>> {
        let mut snapshot = self.inner.get_config_document(key).await?;
        let pending = self.pending.lock().unwrap().take();
        if let Some((entry_key, entry_value)) = pending {
            match self.inner.get_config_document(key).await? {
                None => {
                    let data = BTreeMap::from([(entry_key, entry_value)]);
                    self.inner.create_config_document(key, data).await?;
                }
                Some(doc) => {
                    let rv = doc.resource_version.unwrap_or_default();
                    self.inner
                        .patch_config_entry(key, &rv, &entry_key, &entry_value)
                        .await?;
                }
            }
        }
        if self.hide_version {
            if let Some(doc) = snapshot.as_mut() {
                doc.resource_version = None;
            }
        }
        Ok(snapshot)
    }

    async fn create_config_document(
        &self,
        key: &DocumentKey,
        data: BTreeMap<String, String>,
    ) -> StoreResult<()> {
        self.inner.create_config_document(key, data).await
    }

    async fn patch_config_entry(
        &self,
        key: &DocumentKey,
        resource_version: &str,
        entry_key: &str,
        entry_value: &str,
    ) -> StoreResult<()> {
        self.inner
            .patch_config_entry(key, resource_version, entry_key, entry_value)
            .await
    }

    async fn get_cluster_claim(
        &self,
        name: &str,
    ) -> StoreResult<Option<ClusterClaim>> {
        self.inner.get_cluster_claim(name).await
    }

    async fn create_cluster_claim(
        &self,
        name: &str,
        value: &str,
    ) -> StoreResult<()> {
        self.inner.create_cluster_claim(name, value).await
    }

    async fn set_cluster_claim_value(
        &self,
        name: &str,
        value: &str,
    ) -> StoreResult<()> {
        self.inner.set_cluster_claim_value(name, value).await
    }
}
