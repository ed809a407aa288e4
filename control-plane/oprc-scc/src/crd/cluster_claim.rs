use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Open Cluster Management ClusterClaim; `value` is an opaque string the hub
/// reads back.
#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema,
)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1alpha1",
    kind = "ClusterClaim",
    plural = "clusterclaims"
)]
pub struct ClusterClaimSpec {
    #[serde(default)]
    pub value: String,
}
