use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    Client, ResourceExt,
    api::Api,
    runtime::{Controller, controller::Action, watcher::Config},
};
use tracing::{debug, info, instrument, warn};

use super::{ControllerContext, ReconcileState, error_policy};
use crate::crd::{ClusterClaim, Feature};
use crate::error::SccError;
use crate::fanout;
use crate::identity::{self, IdentityRange};
use crate::merger::UpsertOutcome;
use crate::store::ClusterStore;

impl<S: ClusterStore> ControllerContext<S> {
    /// Start uid of every namespace a Feature installs into. Each distinct
    /// namespace is resolved once per call.
    pub async fn collect_claims(
        &self,
        features: &[Feature],
    ) -> Result<BTreeMap<String, i64>, SccError> {
        let mut claims = BTreeMap::new();
        for feature in features {
            let ns = feature.chart_namespace();
            if ns.is_empty() || claims.contains_key(ns) {
                continue;
            }
            let range = identity::resolve(&self.store, ns).await?;
            claims.insert(ns.to_string(), IdentityRange::start_or_none(range));
        }
        Ok(claims)
    }

    /// Create or overwrite the ClusterClaim value, given the claim as read
    /// at the start of the pass.
    async fn write_claim(
        &self,
        current: Option<&ClusterClaim>,
        value: &str,
    ) -> Result<UpsertOutcome, SccError> {
        let name = &self.cfg.cluster_claim_name;
        match current {
            None => {
                self.store.create_cluster_claim(name, value).await?;
                Ok(UpsertOutcome::Created)
            }
            Some(cc) if cc.spec.value == value => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                self.store.set_cluster_claim_value(name, value).await?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// Recomputes the cluster-wide uid claim after a change to a tracked
    /// namespace, or to the Features installing into it.
    pub async fn reconcile_namespace(
        &self,
        name: &str,
    ) -> Result<ReconcileState, SccError> {
        let Some(ns) = self.store.get_namespace(name).await? else {
            debug!(%name, "namespace gone");
            return Ok(ReconcileState::Unresolved);
        };

        let features = self.store.list_features().await?;
        let current =
            self.store.get_cluster_claim(&self.cfg.cluster_claim_name).await?;
        let eligible = identity::is_tracked(&ns)
            && fanout::has_dependent_features(&features, name);
        // A namespace whose last Feature went away must still drop out of
        // the claim.
        if !eligible && !claim_lists(current.as_ref(), name) {
            debug!(%name, "namespace not tracked or no feature installs into it");
            return Ok(ReconcileState::Unresolved);
        }

        let claims = self.collect_claims(&features).await?;
        let value = serde_yaml::to_string(&claims)?;
        let outcome = self.write_claim(current.as_ref(), &value).await?;
        if outcome != UpsertOutcome::Unchanged {
            info!(
                claim = %self.cfg.cluster_claim_name,
                namespaces = claims.len(),
                "ClusterClaim {}",
                outcome
            );
        }
        Ok(ReconcileState::Resolved(outcome))
    }
}

/// Whether the stored claim has an entry for `namespace`. An unreadable
/// value counts as listing it, so the next pass rewrites it.
fn claim_lists(claim: Option<&ClusterClaim>, namespace: &str) -> bool {
    let Some(claim) = claim else {
        return false;
    };
    serde_yaml::from_str::<BTreeMap<String, i64>>(&claim.spec.value)
        .map(|claims| claims.contains_key(namespace))
        .unwrap_or(true)
}

#[instrument(skip_all, fields(name = %obj.name_any()))]
async fn reconcile(
    obj: Arc<Namespace>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, SccError> {
    let name = obj.name_any();
    ctx.with_deadline(ctx.reconcile_namespace(&name)).await?;
    Ok(Action::await_change())
}

/// Namespace controller maintaining the ClusterClaim. Feature changes
/// re-trigger the namespace they install into.
pub async fn run(client: Client, ctx: Arc<ControllerContext>) {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let features: Api<Feature> = Api::all(client);

    Controller::new(namespaces, Config::default())
        .watches(features, Config::default(), |f: Feature| {
            fanout::namespace_for_feature(&f)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(namespace = %obj.name, "reconciled"),
                Err(e) => warn!(error = %e, "namespace controller error"),
            }
        })
        .await;
}
