use std::time::Duration;

use envconfig::Envconfig;

use crate::store::DocumentKey;

#[derive(Envconfig, Clone, Debug)]
pub struct SccConfig {
    /// ConfigMap holding one rendered values entry per Feature/HelmRelease
    /// Env: OPRC_SCC_CONFIG_NAME
    #[envconfig(from = "OPRC_SCC_CONFIG_NAME", default = "ace-openshift-scc")]
    pub config_name: String,

    #[envconfig(from = "OPRC_SCC_CONFIG_NAMESPACE", default = "kubeops")]
    pub config_namespace: String,

    #[envconfig(
        from = "OPRC_SCC_CLUSTER_CLAIM_NAME",
        default = "openshift.ace.info"
    )]
    pub cluster_claim_name: String,

    /// HelmRelease name that renders `<name>.yaml` even without a matching
    /// Feature.
    /// Env: OPRC_SCC_DEFAULT_RELEASE
    #[envconfig(from = "OPRC_SCC_DEFAULT_RELEASE", default = "ace")]
    pub default_release: String,

    #[envconfig(from = "OPRC_SCC_RECONCILE_TIMEOUT_SECS", default = "30")]
    pub reconcile_timeout_secs: u64,

    /// Backoff before a failed reconcile is retried.
    #[envconfig(from = "OPRC_SCC_REQUEUE_SECS", default = "30")]
    pub requeue_secs: u64,

    #[envconfig(nested)]
    pub features: FeaturesConfig,
}

#[derive(Envconfig, Clone, Debug, Default)]
pub struct FeaturesConfig {
    /// If Some, env explicitly set; otherwise defaults apply
    #[envconfig(from = "OPRC_SCC_FEATURES_FEATURE")]
    pub feature: Option<bool>,
    #[envconfig(from = "OPRC_SCC_FEATURES_RELEASE")]
    pub release: Option<bool>,
    /// Namespace controller writing the ClusterClaim. Only meaningful on
    /// clusters joined to an Open Cluster Management hub.
    #[envconfig(from = "OPRC_SCC_FEATURES_CLUSTER_CLAIM")]
    pub cluster_claim: Option<bool>,
}

impl SccConfig {
    /// Fill unset feature toggles, respecting explicit env overrides.
    ///
    /// `cluster_claim_api` reports whether the ClusterClaim API group is
    /// served; it is the default for the namespace controller.
    pub fn apply_defaults(mut self, cluster_claim_api: bool) -> Self {
        if self.features.feature.is_none() {
            self.features.feature = Some(true);
        }
        if self.features.release.is_none() {
            self.features.release = Some(true);
        }
        if self.features.cluster_claim.is_none() {
            self.features.cluster_claim = Some(cluster_claim_api);
        }
        self
    }

    pub fn config_document(&self) -> DocumentKey {
        DocumentKey::new(&self.config_namespace, &self.config_name)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }
}

impl Default for SccConfig {
    fn default() -> Self {
        Self {
            config_name: "ace-openshift-scc".into(),
            config_namespace: "kubeops".into(),
            cluster_claim_name: "openshift.ace.info".into(),
            default_release: "ace".into(),
            reconcile_timeout_secs: 30,
            requeue_secs: 30,
            features: FeaturesConfig::default(),
        }
    }
}
