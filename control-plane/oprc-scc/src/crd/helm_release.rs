use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Subset of the Flux HelmRelease the operator reads.
#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema,
)]
#[kube(
    group = "helm.toolkit.fluxcd.io",
    version = "v2",
    kind = "HelmRelease",
    plural = "helmreleases",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

impl HelmRelease {
    /// Namespace the release installs into. Flux falls back to the
    /// release's own namespace when `targetNamespace` is unset.
    pub fn target_namespace(&self) -> Option<String> {
        self.spec
            .target_namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .or_else(|| self.namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_namespace_prefers_spec() {
        let mut hr = HelmRelease::new(
            "kubedb",
            HelmReleaseSpec {
                target_namespace: Some("kubedb".into()),
                ..Default::default()
            },
        );
        hr.metadata.namespace = Some("kubeops".into());
        assert_eq!(hr.target_namespace().as_deref(), Some("kubedb"));
    }

    #[test]
    fn target_namespace_falls_back_to_own_namespace() {
        let mut hr = HelmRelease::new(
            "ace",
            HelmReleaseSpec {
                target_namespace: Some(String::new()),
                ..Default::default()
            },
        );
        hr.metadata.namespace = Some("ace".into());
        assert_eq!(hr.target_namespace().as_deref(), Some("ace"));
    }
}
