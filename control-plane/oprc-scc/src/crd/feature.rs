use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Feature from the ACE UI API group. Owned by the platform installer; this
/// operator only reads it.
#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema,
)]
#[kube(
    group = "ui.k8s.appscode.com",
    version = "v1alpha1",
    kind = "Feature",
    plural = "features"
)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template set the rendered values are looked up in, e.g. "openshift"
    #[serde(default)]
    pub feature_set: String,
    #[serde(default)]
    pub chart: ChartInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    #[serde(default)]
    pub name: String,
    /// Namespace the chart is installed into
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Feature {
    pub fn chart_namespace(&self) -> &str {
        &self.spec.chart.namespace
    }
}
