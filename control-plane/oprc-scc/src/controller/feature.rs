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
use crate::crd::Feature;
use crate::error::SccError;
use crate::fanout;
use crate::featuresets::feature_path;
use crate::identity;
use crate::merger::{UpsertOutcome, entry_key, upsert_entry};
use crate::store::ClusterStore;

impl<S: ClusterStore> ControllerContext<S> {
    /// Renders the Feature's values for its chart namespace and stores them
    /// under `<name>.yaml`.
    pub async fn reconcile_feature(
        &self,
        name: &str,
    ) -> Result<ReconcileState, SccError> {
        let Some(feature) = self.store.get_feature(name).await? else {
            debug!(%name, "feature gone");
            return Ok(ReconcileState::Unresolved);
        };

        let target = feature.chart_namespace();
        let Some(range) = identity::resolve(&self.store, target).await? else {
            debug!(%name, namespace = %target, "uid range not assigned yet");
            return Ok(ReconcileState::Unresolved);
        };

        let path = feature_path(&feature.spec.feature_set, name);
        let value = self.catalog.render_or_placeholder(&path, range.start);
        let key = entry_key(name);
        let outcome =
            upsert_entry(&self.store, &self.cfg.config_document(), &key, &value)
                .await?;
        if outcome != UpsertOutcome::Unchanged {
            info!(%name, %key, uid = range.start, "{} configmap", outcome);
        }
        Ok(ReconcileState::Resolved(outcome))
    }
}

#[instrument(skip_all, fields(name = %obj.name_any()))]
async fn reconcile(
    obj: Arc<Feature>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, SccError> {
    let name = obj.name_any();
    ctx.with_deadline(ctx.reconcile_feature(&name)).await?;
    Ok(Action::await_change())
}

/// Feature controller. Namespace events re-trigger every Feature whose
/// chart lives in that namespace, looked up in the controller's own cache.
pub async fn run(client: Client, ctx: Arc<ControllerContext>) {
    let features: Api<Feature> = Api::all(client.clone());
    let namespaces: Api<Namespace> = Api::all(client);

    let controller = Controller::new(features, Config::default());
    let cache = controller.store();
    controller
        .watches(namespaces, Config::default(), move |ns: Namespace| {
            let known = cache.state();
            fanout::feature_triggers(known.iter().map(|f| &**f), &ns)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(feature = %obj.name, "reconciled"),
                Err(e) => warn!(error = %e, "feature controller error"),
            }
        })
        .await;
}
