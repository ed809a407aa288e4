use kube::{Client, Resource, discovery};
use tracing::{debug, info};

use crate::{config::SccConfig, controller::run_controllers, crd::ClusterClaim};

/// Whether the API server serves the ClusterClaim kind, i.e. this cluster
/// is an Open Cluster Management spoke.
pub async fn cluster_claim_api_available(client: &Client) -> bool {
    let group = ClusterClaim::group(&());
    match discovery::group(client, &group).await {
        Ok(api_group) => api_group.recommended_kind("ClusterClaim").is_some(),
        Err(e) => {
            debug!(%group, error = %e, "ClusterClaim API group not served");
            false
        }
    }
}

/// Detect optional APIs, settle feature toggles and run the controllers
/// until shutdown.
pub async fn run_all(client: Client, cfg: SccConfig) -> anyhow::Result<()> {
    let spoke = cluster_claim_api_available(&client).await;
    let cfg = cfg.apply_defaults(spoke);
    info!(?cfg, cluster_claim_api = spoke, "starting controllers");
    run_controllers(client, cfg).await
}
