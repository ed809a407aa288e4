use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    Client,
    api::{Api, ListParams, Patch, PatchParams, PostParams},
};
use serde_json::json;
use tracing::debug;

use super::{ClusterStore, ConfigDocument, DocumentKey};
use crate::crd::{ClusterClaim, ClusterClaimSpec, Feature, HelmRelease};
use crate::error::{SccError, StoreResult};

const FIELD_MANAGER: &str = "oprc-scc";

/// [`ClusterStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == code)
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_namespace(&self, name: &str) -> StoreResult<Option<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_namespace(&self, name: &str) -> StoreResult<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&post_params(), &ns).await {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409) => {
                Err(SccError::AlreadyExists(format!("namespace {name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_feature(&self, name: &str) -> StoreResult<Option<Feature>> {
        let api: Api<Feature> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn list_features(&self) -> StoreResult<Vec<Feature>> {
        let api: Api<Feature> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<HelmRelease>> {
        let api: Api<HelmRelease> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_releases(&self) -> StoreResult<Vec<HelmRelease>> {
        let api: Api<HelmRelease> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_config_document(
        &self,
        key: &DocumentKey,
    ) -> StoreResult<Option<ConfigDocument>> {
        let api: Api<ConfigMap> =
            Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?.map(|cm| ConfigDocument {
            data: cm.data.unwrap_or_default(),
            resource_version: cm.metadata.resource_version,
        }))
    }

    async fn create_config_document(
        &self,
        key: &DocumentKey,
        data: BTreeMap<String, String>,
    ) -> StoreResult<()> {
        let api: Api<ConfigMap> =
            Api::namespaced(self.client.clone(), &key.namespace);
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(key.name.clone()),
                namespace: Some(key.namespace.clone()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        };
        match api.create(&post_params(), &cm).await {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409) => {
                Err(SccError::Conflict(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_config_entry(
        &self,
        key: &DocumentKey,
        resource_version: &str,
        entry_key: &str,
        entry_value: &str,
    ) -> StoreResult<()> {
        let api: Api<ConfigMap> =
            Api::namespaced(self.client.clone(), &key.namespace);
        // resourceVersion in a merge patch acts as a precondition: the API
        // server answers 409 if the ConfigMap moved since our read.
        let patch = json!({
            "metadata": { "resourceVersion": resource_version },
            "data": { (entry_key): entry_value },
        });
        let pp = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        match api.patch(&key.name, &pp, &Patch::Merge(&patch)).await {
            Ok(_) => {
                debug!(document = %key, %entry_key, "patched config entry");
                Ok(())
            }
            Err(e) if is_status(&e, 409) => {
                Err(SccError::Conflict(key.to_string()))
            }
            Err(e) if is_status(&e, 404) => {
                Err(SccError::Conflict(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_cluster_claim(
        &self,
        name: &str,
    ) -> StoreResult<Option<ClusterClaim>> {
        let api: Api<ClusterClaim> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_cluster_claim(
        &self,
        name: &str,
        value: &str,
    ) -> StoreResult<()> {
        let api: Api<ClusterClaim> = Api::all(self.client.clone());
        let cc = ClusterClaim::new(
            name,
            ClusterClaimSpec {
                value: value.to_string(),
            },
        );
        match api.create(&post_params(), &cc).await {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409) => {
                Err(SccError::Conflict(format!("clusterclaim {name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_cluster_claim_value(
        &self,
        name: &str,
        value: &str,
    ) -> StoreResult<()> {
        let api: Api<ClusterClaim> = Api::all(self.client.clone());
        let patch = json!({ "spec": { "value": value } });
        let pp = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        match api.patch(name, &pp, &Patch::Merge(&patch)).await {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 404) => {
                Err(SccError::NotFound(format!("clusterclaim {name}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}
